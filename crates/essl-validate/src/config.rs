//! Validation configuration: implementation limits and policy flags.

use std::fmt;

/// Which shader stage a session is validating.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// Target language for generated code.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum OutputFormat {
    /// Pass-through: echo validated GLSL-ES.
    #[default]
    Glsl,
    /// HLSL for Direct3D 9 (loose uniforms, `tex2D`, half-pixel fixup).
    Hlsl9,
    /// HLSL for Direct3D 10+ (cbuffer, `SV_*` semantics, `Texture2D`).
    Hlsl10,
}

impl OutputFormat {
    pub fn is_hlsl(self) -> bool {
        matches!(self, Self::Hlsl9 | Self::Hlsl10)
    }

    /// Direct3D version the format targets, if any.
    pub fn directx_version(self) -> Option<u32> {
        match self {
            Self::Glsl => None,
            Self::Hlsl9 => Some(9),
            Self::Hlsl10 => Some(10),
        }
    }
}

/// Implementation limits and validation policy.
///
/// The limit fields substitute for the symbolic array bounds of builtin
/// variables (`gl_FragData[gl_MaxDrawBuffers]`) and surface as builtin
/// constants inside the shader.
#[derive(Clone, Debug)]
pub struct Config {
    pub max_vertex_attribs: u32,
    pub max_vertex_uniform_vectors: u32,
    pub max_varying_vectors: u32,
    pub max_vertex_texture_image_units: u32,
    pub max_combined_texture_image_units: u32,
    pub max_texture_image_units: u32,
    pub max_fragment_uniform_vectors: u32,
    pub max_draw_buffers: u32,

    pub output_format: OutputFormat,
    /// Reject non-constant indexing into uniform arrays in fragment shaders.
    pub fragment_constant_uniform_array_indexing: bool,
    /// Rewrite non-constant uniform-array indices to clamp against the
    /// declared bound instead of rejecting them.
    pub clamp_out_of_bound_uniform_array_indexing: bool,
    /// `GL_OES_standard_derivatives` is available for enabling.
    pub support_oes_derivatives: bool,
    /// `highp` is usable in fragment shaders.
    pub support_highp_fragment: bool,
}

impl Default for Config {
    fn default() -> Self {
        // WebGL 1.0 minimum values.
        Self {
            max_vertex_attribs: 8,
            max_vertex_uniform_vectors: 128,
            max_varying_vectors: 8,
            max_vertex_texture_image_units: 0,
            max_combined_texture_image_units: 8,
            max_texture_image_units: 8,
            max_fragment_uniform_vectors: 16,
            max_draw_buffers: 1,
            output_format: OutputFormat::Glsl,
            fragment_constant_uniform_array_indexing: true,
            clamp_out_of_bound_uniform_array_indexing: false,
            support_oes_derivatives: false,
            support_highp_fragment: true,
        }
    }
}

impl Config {
    /// Resolves a symbolic limit key (the GLSL builtin constant name).
    pub fn limit(&self, key: &str) -> Option<u32> {
        Some(match key {
            "gl_MaxVertexAttribs" => self.max_vertex_attribs,
            "gl_MaxVertexUniformVectors" => self.max_vertex_uniform_vectors,
            "gl_MaxVaryingVectors" => self.max_varying_vectors,
            "gl_MaxVertexTextureImageUnits" => self.max_vertex_texture_image_units,
            "gl_MaxCombinedTextureImageUnits" => self.max_combined_texture_image_units,
            "gl_MaxTextureImageUnits" => self.max_texture_image_units,
            "gl_MaxFragmentUniformVectors" => self.max_fragment_uniform_vectors,
            "gl_MaxDrawBuffers" => self.max_draw_buffers,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_resolve_by_key() {
        let config = Config {
            max_draw_buffers: 4,
            ..Config::default()
        };
        assert_eq!(config.limit("gl_MaxDrawBuffers"), Some(4));
        assert_eq!(config.limit("gl_MaxVertexAttribs"), Some(8));
        assert_eq!(config.limit("gl_NotALimit"), None);
    }

    #[test]
    fn output_format_versions() {
        assert_eq!(OutputFormat::Glsl.directx_version(), None);
        assert_eq!(OutputFormat::Hlsl9.directx_version(), Some(9));
        assert_eq!(OutputFormat::Hlsl10.directx_version(), Some(10));
        assert!(OutputFormat::Hlsl9.is_hlsl());
        assert!(!OutputFormat::Glsl.is_hlsl());
    }
}
