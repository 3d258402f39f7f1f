//! Generated helper functions for GLSL intrinsics HLSL lacks natively.
//!
//! Call sites register the helpers they need in a [`HelperSet`] bitmap
//! during emission; only the registered helpers are written into the
//! output, ahead of the translated code.

/// One emittable helper function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
#[repr(u32)]
pub enum Helper {
    ModFVec2,
    ModFVec3,
    ModFVec4,
    MinFVec2,
    MinFVec3,
    MinFVec4,
    MaxFVec2,
    MaxFVec3,
    MaxFVec4,
    ClampFVec2,
    ClampFVec3,
    ClampFVec4,
    LerpFVec2,
    LerpFVec3,
    LerpFVec4,
    StepFVec2,
    StepFVec3,
    StepFVec4,
    SmoothStepFVec2,
    SmoothStepFVec3,
    SmoothStepFVec4,
    MatCompMult2,
    MatCompMult3,
    MatCompMult4,
    EqualFVec2,
    EqualFVec3,
    EqualFVec4,
    EqualIVec2,
    EqualIVec3,
    EqualIVec4,
    EqualBVec2,
    EqualBVec3,
    EqualBVec4,
    Tex2DBias,
    Tex2DProj3,
    Tex2DProj3Bias,
    Tex2DProj4,
    Tex2DProj4Bias,
    Tex2DLod,
    Tex2DProj3Lod,
    Tex2DProj4Lod,
    TexCubeBias,
    TexCubeLod,
    Mat2ToMat3,
    Mat2ToMat4,
    Mat3ToMat4,
    ClampIndex,
}

impl Helper {
    /// Picks the vector-width variant from a base helper (the `FVec2`
    /// member of its family) and a component count. Families are laid out
    /// contiguously in declaration order.
    pub fn sized(base: Helper, width: u32) -> Helper {
        let offset = match width {
            2 => 0,
            3 => 1,
            _ => 2,
        };
        Self::from_index(base as u32 + offset).unwrap_or(base)
    }

    /// The emitted function name.
    pub fn name(self) -> &'static str {
        match self {
            Self::ModFVec2 => "essl_mod_fvec2",
            Self::ModFVec3 => "essl_mod_fvec3",
            Self::ModFVec4 => "essl_mod_fvec4",
            Self::MinFVec2 => "essl_min_fvec2",
            Self::MinFVec3 => "essl_min_fvec3",
            Self::MinFVec4 => "essl_min_fvec4",
            Self::MaxFVec2 => "essl_max_fvec2",
            Self::MaxFVec3 => "essl_max_fvec3",
            Self::MaxFVec4 => "essl_max_fvec4",
            Self::ClampFVec2 => "essl_clamp_fvec2",
            Self::ClampFVec3 => "essl_clamp_fvec3",
            Self::ClampFVec4 => "essl_clamp_fvec4",
            Self::LerpFVec2 => "essl_lerp_fvec2",
            Self::LerpFVec3 => "essl_lerp_fvec3",
            Self::LerpFVec4 => "essl_lerp_fvec4",
            Self::StepFVec2 => "essl_step_fvec2",
            Self::StepFVec3 => "essl_step_fvec3",
            Self::StepFVec4 => "essl_step_fvec4",
            Self::SmoothStepFVec2 => "essl_smoothstep_fvec2",
            Self::SmoothStepFVec3 => "essl_smoothstep_fvec3",
            Self::SmoothStepFVec4 => "essl_smoothstep_fvec4",
            Self::MatCompMult2 => "essl_matcompmult_mat2",
            Self::MatCompMult3 => "essl_matcompmult_mat3",
            Self::MatCompMult4 => "essl_matcompmult_mat4",
            Self::EqualFVec2 => "essl_equal_fvec2",
            Self::EqualFVec3 => "essl_equal_fvec3",
            Self::EqualFVec4 => "essl_equal_fvec4",
            Self::EqualIVec2 => "essl_equal_ivec2",
            Self::EqualIVec3 => "essl_equal_ivec3",
            Self::EqualIVec4 => "essl_equal_ivec4",
            Self::EqualBVec2 => "essl_equal_bvec2",
            Self::EqualBVec3 => "essl_equal_bvec3",
            Self::EqualBVec4 => "essl_equal_bvec4",
            Self::Tex2DBias => "essl_tex2d_bias",
            Self::Tex2DProj3 => "essl_tex2d_proj3",
            Self::Tex2DProj3Bias => "essl_tex2d_proj3_bias",
            Self::Tex2DProj4 => "essl_tex2d_proj4",
            Self::Tex2DProj4Bias => "essl_tex2d_proj4_bias",
            Self::Tex2DLod => "essl_tex2d_lod",
            Self::Tex2DProj3Lod => "essl_tex2d_proj3_lod",
            Self::Tex2DProj4Lod => "essl_tex2d_proj4_lod",
            Self::TexCubeBias => "essl_texcube_bias",
            Self::TexCubeLod => "essl_texcube_lod",
            Self::Mat2ToMat3 => "essl_mat2_to_mat3",
            Self::Mat2ToMat4 => "essl_mat2_to_mat4",
            Self::Mat3ToMat4 => "essl_mat3_to_mat4",
            Self::ClampIndex => essl_validate::CLAMP_HELPER,
        }
    }

    /// HLSL source for the helper; texture helpers differ per profile.
    pub fn source(self, dx10: bool) -> String {
        let n = self.name();
        match self {
            Self::ModFVec2 | Self::ModFVec3 | Self::ModFVec4 => {
                let v = vec_name(self as u32 - Self::ModFVec2 as u32);
                format!("{v} {n}({v} x, float y) {{ return x - y * floor(x / y); }}")
            }
            Self::MinFVec2 | Self::MinFVec3 | Self::MinFVec4 => {
                let v = vec_name(self as u32 - Self::MinFVec2 as u32);
                format!("{v} {n}({v} x, float y) {{ return min(x, ({v})y); }}")
            }
            Self::MaxFVec2 | Self::MaxFVec3 | Self::MaxFVec4 => {
                let v = vec_name(self as u32 - Self::MaxFVec2 as u32);
                format!("{v} {n}({v} x, float y) {{ return max(x, ({v})y); }}")
            }
            Self::ClampFVec2 | Self::ClampFVec3 | Self::ClampFVec4 => {
                let v = vec_name(self as u32 - Self::ClampFVec2 as u32);
                format!("{v} {n}({v} x, float lo, float hi) {{ return clamp(x, ({v})lo, ({v})hi); }}")
            }
            Self::LerpFVec2 | Self::LerpFVec3 | Self::LerpFVec4 => {
                let v = vec_name(self as u32 - Self::LerpFVec2 as u32);
                format!("{v} {n}({v} x, {v} y, float a) {{ return lerp(x, y, ({v})a); }}")
            }
            Self::StepFVec2 | Self::StepFVec3 | Self::StepFVec4 => {
                let v = vec_name(self as u32 - Self::StepFVec2 as u32);
                format!("{v} {n}(float edge, {v} x) {{ return step(({v})edge, x); }}")
            }
            Self::SmoothStepFVec2 | Self::SmoothStepFVec3 | Self::SmoothStepFVec4 => {
                let v = vec_name(self as u32 - Self::SmoothStepFVec2 as u32);
                format!(
                    "{v} {n}(float e0, float e1, {v} x) {{ return smoothstep(({v})e0, ({v})e1, x); }}"
                )
            }
            Self::MatCompMult2 | Self::MatCompMult3 | Self::MatCompMult4 => {
                let m = mat_name(self as u32 - Self::MatCompMult2 as u32);
                // '*' on HLSL matrices is component-wise.
                format!("{m} {n}({m} a, {m} b) {{ return a * b; }}")
            }
            Self::EqualFVec2 | Self::EqualFVec3 | Self::EqualFVec4 => {
                let i = self as u32 - Self::EqualFVec2 as u32;
                let (v, b) = (vec_name(i), bvec_name(i));
                format!("{b} {n}({v} a, {v} b) {{ return a == b; }}")
            }
            Self::EqualIVec2 | Self::EqualIVec3 | Self::EqualIVec4 => {
                let i = self as u32 - Self::EqualIVec2 as u32;
                let (v, b) = (ivec_name(i), bvec_name(i));
                format!("{b} {n}({v} a, {v} b) {{ return a == b; }}")
            }
            Self::EqualBVec2 | Self::EqualBVec3 | Self::EqualBVec4 => {
                let i = self as u32 - Self::EqualBVec2 as u32;
                let b = bvec_name(i);
                format!("{b} {n}({b} a, {b} b) {{ return a == b; }}")
            }
            Self::Tex2DBias => tex2d(dx10, n, "float2 uv, float b", "SampleBias(s, uv, b)", "tex2Dbias(s, float4(uv, 0.0, b))"),
            Self::Tex2DProj3 => tex2d(dx10, n, "float3 c", "Sample(s, c.xy / c.z)", "tex2D(s, c.xy / c.z)"),
            Self::Tex2DProj3Bias => tex2d(dx10, n, "float3 c, float b", "SampleBias(s, c.xy / c.z, b)", "tex2Dbias(s, float4(c.xy / c.z, 0.0, b))"),
            Self::Tex2DProj4 => tex2d(dx10, n, "float4 c", "Sample(s, c.xy / c.w)", "tex2Dproj(s, c)"),
            Self::Tex2DProj4Bias => tex2d(dx10, n, "float4 c, float b", "SampleBias(s, c.xy / c.w, b)", "tex2Dbias(s, float4(c.xy / c.w, 0.0, b))"),
            Self::Tex2DLod => tex2d(dx10, n, "float2 uv, float l", "SampleLevel(s, uv, l)", "tex2Dlod(s, float4(uv, 0.0, l))"),
            Self::Tex2DProj3Lod => tex2d(dx10, n, "float3 c, float l", "SampleLevel(s, c.xy / c.z, l)", "tex2Dlod(s, float4(c.xy / c.z, 0.0, l))"),
            Self::Tex2DProj4Lod => tex2d(dx10, n, "float4 c, float l", "SampleLevel(s, c.xy / c.w, l)", "tex2Dlod(s, float4(c.xy / c.w, 0.0, l))"),
            Self::TexCubeBias => texcube(dx10, n, "float3 c, float b", "SampleBias(s, c, b)", "texCUBEbias(s, float4(c, b))"),
            Self::TexCubeLod => texcube(dx10, n, "float3 c, float l", "SampleLevel(s, c, l)", "texCUBElod(s, float4(c, l))"),
            Self::Mat2ToMat3 => format!(
                "float3x3 {n}(float2x2 m) {{ return float3x3(m[0][0], m[0][1], 0.0, m[1][0], m[1][1], 0.0, 0.0, 0.0, 1.0); }}"
            ),
            Self::Mat2ToMat4 => format!(
                "float4x4 {n}(float2x2 m) {{ return float4x4(m[0][0], m[0][1], 0.0, 0.0, m[1][0], m[1][1], 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0); }}"
            ),
            Self::Mat3ToMat4 => format!(
                "float4x4 {n}(float3x3 m) {{ return float4x4(m[0][0], m[0][1], m[0][2], 0.0, m[1][0], m[1][1], m[1][2], 0.0, m[2][0], m[2][1], m[2][2], 0.0, 0.0, 0.0, 0.0, 1.0); }}"
            ),
            Self::ClampIndex => {
                format!("int {n}(int i, int maxIndex) {{ return clamp(i, 0, maxIndex); }}")
            }
        }
    }

    const ALL: [Helper; Helper::COUNT as usize] = [
        Self::ModFVec2,
        Self::ModFVec3,
        Self::ModFVec4,
        Self::MinFVec2,
        Self::MinFVec3,
        Self::MinFVec4,
        Self::MaxFVec2,
        Self::MaxFVec3,
        Self::MaxFVec4,
        Self::ClampFVec2,
        Self::ClampFVec3,
        Self::ClampFVec4,
        Self::LerpFVec2,
        Self::LerpFVec3,
        Self::LerpFVec4,
        Self::StepFVec2,
        Self::StepFVec3,
        Self::StepFVec4,
        Self::SmoothStepFVec2,
        Self::SmoothStepFVec3,
        Self::SmoothStepFVec4,
        Self::MatCompMult2,
        Self::MatCompMult3,
        Self::MatCompMult4,
        Self::EqualFVec2,
        Self::EqualFVec3,
        Self::EqualFVec4,
        Self::EqualIVec2,
        Self::EqualIVec3,
        Self::EqualIVec4,
        Self::EqualBVec2,
        Self::EqualBVec3,
        Self::EqualBVec4,
        Self::Tex2DBias,
        Self::Tex2DProj3,
        Self::Tex2DProj3Bias,
        Self::Tex2DProj4,
        Self::Tex2DProj4Bias,
        Self::Tex2DLod,
        Self::Tex2DProj3Lod,
        Self::Tex2DProj4Lod,
        Self::TexCubeBias,
        Self::TexCubeLod,
        Self::Mat2ToMat3,
        Self::Mat2ToMat4,
        Self::Mat3ToMat4,
        Self::ClampIndex,
    ];

    const COUNT: u32 = 47;

    fn from_index(index: u32) -> Option<Helper> {
        Self::ALL.get(index as usize).copied()
    }
}

fn vec_name(offset: u32) -> &'static str {
    ["float2", "float3", "float4"][offset as usize]
}

fn ivec_name(offset: u32) -> &'static str {
    ["int2", "int3", "int4"][offset as usize]
}

fn bvec_name(offset: u32) -> &'static str {
    ["bool2", "bool3", "bool4"][offset as usize]
}

fn tex2d(dx10: bool, name: &str, args: &str, sample: &str, legacy: &str) -> String {
    if dx10 {
        format!("float4 {name}(Texture2D t, SamplerState s, {args}) {{ return t.{sample}; }}")
    } else {
        format!("float4 {name}(sampler2D s, {args}) {{ return {legacy}; }}")
    }
}

fn texcube(dx10: bool, name: &str, args: &str, sample: &str, legacy: &str) -> String {
    if dx10 {
        format!("float4 {name}(TextureCube t, SamplerState s, {args}) {{ return t.{sample}; }}")
    } else {
        format!("float4 {name}(samplerCUBE s, {args}) {{ return {legacy}; }}")
    }
}

fn mat_name(offset: u32) -> &'static str {
    ["float2x2", "float3x3", "float4x4"][offset as usize]
}

/// Bitmap of helpers a translation actually calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HelperSet(u64);

impl HelperSet {
    pub const EMPTY: Self = Self(0);

    pub fn insert(&mut self, helper: Helper) {
        self.0 |= 1 << helper as u32;
    }

    pub fn contains(self, helper: Helper) -> bool {
        self.0 & (1 << helper as u32) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the registered helpers in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Helper> {
        (0..Helper::COUNT)
            .filter_map(Helper::from_index)
            .filter(move |h| self.contains(*h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_selects_family_member() {
        assert_eq!(Helper::sized(Helper::ModFVec2, 2), Helper::ModFVec2);
        assert_eq!(Helper::sized(Helper::ModFVec2, 3), Helper::ModFVec3);
        assert_eq!(Helper::sized(Helper::LerpFVec2, 4), Helper::LerpFVec4);
    }

    #[test]
    fn set_roundtrip() {
        let mut set = HelperSet::EMPTY;
        assert!(set.is_empty());
        set.insert(Helper::ModFVec3);
        set.insert(Helper::ClampIndex);
        assert!(set.contains(Helper::ModFVec3));
        assert!(!set.contains(Helper::ModFVec2));
        let collected: Vec<_> = set.iter().collect();
        assert_eq!(collected, vec![Helper::ModFVec3, Helper::ClampIndex]);
    }

    #[test]
    fn sources_mention_their_names() {
        for index in 0..Helper::COUNT {
            let helper = Helper::from_index(index).unwrap();
            assert!(helper.source(false).contains(helper.name()));
            assert!(helper.source(true).contains(helper.name()));
        }
    }

    #[test]
    fn dx10_texture_helpers_take_texture_objects() {
        assert!(Helper::Tex2DBias.source(true).contains("Texture2D"));
        assert!(Helper::Tex2DBias.source(false).contains("sampler2D"));
    }
}
