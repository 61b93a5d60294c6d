//! Closed effect enumeration and typed per-effect parameter records.
//!
//! Each effect kind maps to one external processor program and one
//! parameter record shape. Callers may submit a partial record: missing
//! fields take the documented default, present fields are range-checked
//! at submission time, and wrong-typed fields are a validation error.
//! Unknown fields are ignored.
//!
//! The serialized record (`to_processor_json`) is the flat
//! string/number/bool object handed to the processor as its third
//! positional argument.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Effect kinds
// ---------------------------------------------------------------------------

/// The closed set of post-processing transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    VhsV1,
    VhsV2,
    CathodeRay,
    HalationBloom,
    GslV1,
    TrailsV2,
    Upscale,
}

impl EffectKind {
    /// All kinds, in processor-catalog order.
    pub const ALL: [EffectKind; 7] = [
        EffectKind::VhsV1,
        EffectKind::VhsV2,
        EffectKind::CathodeRay,
        EffectKind::HalationBloom,
        EffectKind::GslV1,
        EffectKind::TrailsV2,
        EffectKind::Upscale,
    ];

    /// Wire / filename identifier (`vhs_v1`, `cathode_ray`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VhsV1 => "vhs_v1",
            Self::VhsV2 => "vhs_v2",
            Self::CathodeRay => "cathode_ray",
            Self::HalationBloom => "halation_bloom",
            Self::GslV1 => "gsl_v1",
            Self::TrailsV2 => "trails_v2",
            Self::Upscale => "upscale",
        }
    }

    /// Human-readable name used when annotating derived titles.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::VhsV1 => "VHS v1",
            Self::VhsV2 => "VHS v2",
            Self::CathodeRay => "Cathode Ray",
            Self::HalationBloom => "Halation & Bloom",
            Self::GslV1 => "GSL Shader",
            Self::TrailsV2 => "Motion Trails",
            Self::Upscale => "Interlaced Upscale",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EffectKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown effect kind '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Range-check helpers
// ---------------------------------------------------------------------------

fn check_f64(field: &str, value: f64, min: f64, max: f64) -> Result<(), CoreError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

fn check_u32(field: &str, value: u32, min: u32, max: u32) -> Result<(), CoreError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

fn check_odd(field: &str, value: u32) -> Result<(), CoreError> {
    if value % 2 == 1 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{field} must be odd (blur kernel size), got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Per-effect parameter records
// ---------------------------------------------------------------------------

/// VHS v1: luma/chroma compression with generational decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhsV1Params {
    pub luma_compression_rate: f64,
    pub luma_noise_sigma: f64,
    pub luma_noise_mean: f64,
    pub chroma_compression_rate: f64,
    pub chroma_noise_intensity: f64,
    pub vertical_blur: u32,
    pub horizontal_blur: u32,
    pub border_size: f64,
    pub generations: u32,
}

impl Default for VhsV1Params {
    fn default() -> Self {
        Self {
            luma_compression_rate: 1.0,
            luma_noise_sigma: 30.0,
            luma_noise_mean: 0.0,
            chroma_compression_rate: 1.0,
            chroma_noise_intensity: 10.0,
            vertical_blur: 1,
            horizontal_blur: 1,
            border_size: 1.7,
            generations: 3,
        }
    }
}

impl VhsV1Params {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("luma_compression_rate", self.luma_compression_rate, 0.1, 10.0)?;
        check_f64("luma_noise_sigma", self.luma_noise_sigma, 0.0, 100.0)?;
        check_f64("luma_noise_mean", self.luma_noise_mean, -50.0, 50.0)?;
        check_f64("chroma_compression_rate", self.chroma_compression_rate, 0.1, 10.0)?;
        check_f64("chroma_noise_intensity", self.chroma_noise_intensity, 0.0, 50.0)?;
        check_u32("vertical_blur", self.vertical_blur, 1, 15)?;
        check_odd("vertical_blur", self.vertical_blur)?;
        check_u32("horizontal_blur", self.horizontal_blur, 1, 15)?;
        check_odd("horizontal_blur", self.horizontal_blur)?;
        check_f64("border_size", self.border_size, 0.0, 10.0)?;
        check_u32("generations", self.generations, 1, 10)
    }
}

/// Recording speed for [`VhsV2Params`]; slower speeds degrade more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapeSpeed {
    #[serde(rename = "SP")]
    Sp,
    #[serde(rename = "LP")]
    Lp,
    #[serde(rename = "EP")]
    Ep,
}

/// VHS v2: composite-signal emulation with ringing artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VhsV2Params {
    pub composite_preemphasis: f64,
    pub vhs_out_sharpen: f64,
    pub color_bleeding: f64,
    pub video_noise: f64,
    pub chroma_noise: f64,
    pub chroma_phase_noise: f64,
    pub enable_ringing: bool,
    pub ringing_power: u32,
    pub tape_speed: TapeSpeed,
}

impl Default for VhsV2Params {
    fn default() -> Self {
        Self {
            composite_preemphasis: 4.0,
            vhs_out_sharpen: 2.5,
            color_bleeding: 5.0,
            video_noise: 1000.0,
            chroma_noise: 5000.0,
            chroma_phase_noise: 25.0,
            enable_ringing: true,
            ringing_power: 2,
            tape_speed: TapeSpeed::Sp,
        }
    }
}

impl VhsV2Params {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("composite_preemphasis", self.composite_preemphasis, 0.0, 8.0)?;
        check_f64("vhs_out_sharpen", self.vhs_out_sharpen, 1.0, 5.0)?;
        check_f64("color_bleeding", self.color_bleeding, 0.0, 10.0)?;
        check_f64("video_noise", self.video_noise, 0.0, 4200.0)?;
        check_f64("chroma_noise", self.chroma_noise, 0.0, 16384.0)?;
        check_f64("chroma_phase_noise", self.chroma_phase_noise, 0.0, 50.0)?;
        check_u32("ringing_power", self.ringing_power, 2, 7)
    }
}

/// Screen behaviour preset for [`CathodeRayParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrtPreset {
    Static,
    Fluctuating,
    Degraded,
    Custom,
}

/// Cathode ray: CRT screen simulation (curvature, scanlines, glow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CathodeRayParams {
    pub preset: CrtPreset,
    /// Time-based intensity expression, used only with `preset = custom`.
    pub custom_expression: String,
    pub screen_curvature: f64,
    pub scanline_intensity: f64,
    pub glow_amount: f64,
    pub color_bleeding: f64,
    pub noise_amount: f64,
}

impl Default for CathodeRayParams {
    fn default() -> Self {
        Self {
            preset: CrtPreset::Static,
            custom_expression: "sin(t/10) * 0.1 + 0.2".to_string(),
            screen_curvature: 0.2,
            scanline_intensity: 0.3,
            glow_amount: 0.2,
            color_bleeding: 0.15,
            noise_amount: 0.05,
        }
    }
}

impl CathodeRayParams {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("screen_curvature", self.screen_curvature, 0.0, 1.0)?;
        check_f64("scanline_intensity", self.scanline_intensity, 0.0, 1.0)?;
        check_f64("glow_amount", self.glow_amount, 0.0, 1.0)?;
        check_f64("color_bleeding", self.color_bleeding, 0.0, 1.0)?;
        check_f64("noise_amount", self.noise_amount, 0.0, 1.0)
    }
}

/// Which halo component [`HalationBloomParams`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HalationMode {
    Halation,
    Bloom,
    Both,
}

/// Halation & bloom: film-style highlight halos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalationBloomParams {
    pub effect_mode: HalationMode,
    pub intensity: f64,
    pub threshold: f64,
    pub radius: u32,
    pub chromatic_aberration: f64,
    pub temporal_variation: f64,
    pub red_offset: f64,
}

impl Default for HalationBloomParams {
    fn default() -> Self {
        Self {
            effect_mode: HalationMode::Both,
            intensity: 1.0,
            threshold: 0.6,
            radius: 15,
            chromatic_aberration: 0.5,
            temporal_variation: 0.2,
            red_offset: 1.2,
        }
    }
}

impl HalationBloomParams {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("intensity", self.intensity, 0.0, 3.0)?;
        check_f64("threshold", self.threshold, 0.0, 1.0)?;
        check_u32("radius", self.radius, 1, 50)?;
        check_f64("chromatic_aberration", self.chromatic_aberration, 0.0, 2.0)?;
        check_f64("temporal_variation", self.temporal_variation, 0.0, 1.0)?;
        check_f64("red_offset", self.red_offset, 0.5, 2.0)
    }
}

/// Shader preset for [`GslV1Params`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderPreset {
    Custom,
    EdgeDetection,
    GaussianBlur,
    Pixelate,
    WaveDistortion,
}

/// GSL v1: fragment-shader style frame transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GslV1Params {
    pub effect_preset: ShaderPreset,
    pub intensity: f64,
    pub blur_radius: f64,
    pub edge_threshold: f64,
    pub pixelate_factor: u32,
    pub wave_amplitude: f64,
    pub wave_frequency: f64,
    pub chromatic_shift: f64,
}

impl Default for GslV1Params {
    fn default() -> Self {
        Self {
            effect_preset: ShaderPreset::Custom,
            intensity: 1.0,
            blur_radius: 2.0,
            edge_threshold: 0.1,
            pixelate_factor: 4,
            wave_amplitude: 0.1,
            wave_frequency: 5.0,
            chromatic_shift: 0.01,
        }
    }
}

impl GslV1Params {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("intensity", self.intensity, 0.0, 2.0)?;
        check_f64("blur_radius", self.blur_radius, 0.0, 10.0)?;
        check_f64("edge_threshold", self.edge_threshold, 0.0, 1.0)?;
        check_u32("pixelate_factor", self.pixelate_factor, 1, 64)?;
        check_f64("wave_amplitude", self.wave_amplitude, 0.0, 1.0)?;
        check_f64("wave_frequency", self.wave_frequency, 0.0, 20.0)?;
        check_f64("chromatic_shift", self.chromatic_shift, 0.0, 0.1)
    }
}

/// Trails v2: temporal motion-trail accumulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailsV2Params {
    pub trail_strength: f64,
    pub decay_rate: f64,
    pub color_bleed: f64,
    pub blur_amount: f64,
    pub threshold: f64,
}

impl Default for TrailsV2Params {
    fn default() -> Self {
        Self {
            trail_strength: 0.85,
            decay_rate: 0.15,
            color_bleed: 0.3,
            blur_amount: 0.5,
            threshold: 0.1,
        }
    }
}

impl TrailsV2Params {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("trail_strength", self.trail_strength, 0.0, 1.0)?;
        check_f64("decay_rate", self.decay_rate, 0.0, 1.0)?;
        check_f64("color_bleed", self.color_bleed, 0.0, 1.0)?;
        check_f64("blur_amount", self.blur_amount, 0.0, 5.0)?;
        check_f64("threshold", self.threshold, 0.0, 1.0)
    }
}

/// Pixel interpolation used by [`UpscaleParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Bilinear,
    Bicubic,
    Nearest,
}

/// Interlaced field ordering for [`UpscaleParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrder {
    Tff,
    Bff,
}

/// Motion-compensation strategy for [`UpscaleParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionCompensation {
    Basic,
    Advanced,
}

/// Upscale: interlaced upscaling with retro artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpscaleParams {
    pub scale_factor: f64,
    pub interpolation_mode: Interpolation,
    pub field_order: FieldOrder,
    pub motion_compensation: MotionCompensation,
    pub interlace_artifacts: bool,
}

impl Default for UpscaleParams {
    fn default() -> Self {
        Self {
            scale_factor: 2.0,
            interpolation_mode: Interpolation::Bilinear,
            field_order: FieldOrder::Tff,
            motion_compensation: MotionCompensation::Basic,
            interlace_artifacts: true,
        }
    }
}

impl UpscaleParams {
    fn validate(&self) -> Result<(), CoreError> {
        check_f64("scale_factor", self.scale_factor, 1.0, 4.0)
    }
}

// ---------------------------------------------------------------------------
// Tagged parameter variant
// ---------------------------------------------------------------------------

/// One parameter record, discriminated by effect kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectParameters {
    VhsV1(VhsV1Params),
    VhsV2(VhsV2Params),
    CathodeRay(CathodeRayParams),
    HalationBloom(HalationBloomParams),
    GslV1(GslV1Params),
    TrailsV2(TrailsV2Params),
    Upscale(UpscaleParams),
}

impl EffectParameters {
    /// The effect kind this record belongs to.
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::VhsV1(_) => EffectKind::VhsV1,
            Self::VhsV2(_) => EffectKind::VhsV2,
            Self::CathodeRay(_) => EffectKind::CathodeRay,
            Self::HalationBloom(_) => EffectKind::HalationBloom,
            Self::GslV1(_) => EffectKind::GslV1,
            Self::TrailsV2(_) => EffectKind::TrailsV2,
            Self::Upscale(_) => EffectKind::Upscale,
        }
    }

    /// The documented default record for a kind.
    pub fn defaults_for(kind: EffectKind) -> Self {
        match kind {
            EffectKind::VhsV1 => Self::VhsV1(VhsV1Params::default()),
            EffectKind::VhsV2 => Self::VhsV2(VhsV2Params::default()),
            EffectKind::CathodeRay => Self::CathodeRay(CathodeRayParams::default()),
            EffectKind::HalationBloom => Self::HalationBloom(HalationBloomParams::default()),
            EffectKind::GslV1 => Self::GslV1(GslV1Params::default()),
            EffectKind::TrailsV2 => Self::TrailsV2(TrailsV2Params::default()),
            EffectKind::Upscale => Self::Upscale(UpscaleParams::default()),
        }
    }

    /// Build a validated record for `kind` from a caller-supplied partial
    /// JSON object.
    ///
    /// `None` (or an empty object) yields the defaults. Missing fields
    /// take their defaults; wrong-typed or out-of-range fields fail with
    /// a validation error. Unknown fields are ignored.
    pub fn for_kind(
        kind: EffectKind,
        supplied: Option<serde_json::Value>,
    ) -> Result<Self, CoreError> {
        let params = match supplied {
            None => Self::defaults_for(kind),
            Some(value) => {
                if !value.is_object() {
                    return Err(CoreError::Validation(
                        "Effect parameters must be a JSON object".into(),
                    ));
                }
                let parse = |e: serde_json::Error| {
                    CoreError::Validation(format!("Invalid {kind} parameters: {e}"))
                };
                match kind {
                    EffectKind::VhsV1 => {
                        Self::VhsV1(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::VhsV2 => {
                        Self::VhsV2(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::CathodeRay => {
                        Self::CathodeRay(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::HalationBloom => {
                        Self::HalationBloom(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::GslV1 => {
                        Self::GslV1(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::TrailsV2 => {
                        Self::TrailsV2(serde_json::from_value(value).map_err(parse)?)
                    }
                    EffectKind::Upscale => {
                        Self::Upscale(serde_json::from_value(value).map_err(parse)?)
                    }
                }
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Range-check every field of the record.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::VhsV1(p) => p.validate(),
            Self::VhsV2(p) => p.validate(),
            Self::CathodeRay(p) => p.validate(),
            Self::HalationBloom(p) => p.validate(),
            Self::GslV1(p) => p.validate(),
            Self::TrailsV2(p) => p.validate(),
            Self::Upscale(p) => p.validate(),
        }
    }

    /// The flat parameter object passed to the external processor.
    ///
    /// Only the variant's own fields, no `kind` tag: the processor is
    /// selected by program, not by record contents.
    pub fn to_processor_json(&self) -> serde_json::Value {
        let value = match self {
            Self::VhsV1(p) => serde_json::to_value(p),
            Self::VhsV2(p) => serde_json::to_value(p),
            Self::CathodeRay(p) => serde_json::to_value(p),
            Self::HalationBloom(p) => serde_json::to_value(p),
            Self::GslV1(p) => serde_json::to_value(p),
            Self::TrailsV2(p) => serde_json::to_value(p),
            Self::Upscale(p) => serde_json::to_value(p),
        };
        // Serialization of plain structs with only primitive fields
        // cannot fail.
        value.unwrap_or(serde_json::Value::Null)
    }
}
