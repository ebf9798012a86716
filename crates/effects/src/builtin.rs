//! Built-in effect catalog.
//!
//! Each definition here has a matching fragment shader under `shaders/`,
//! embedded at compile time and exposed through [`SHADERS`].
use crate::definition::{Category, EffectDefinition};
use crate::param::ParameterSpec;

macro_rules! shader {
    ($name:literal) => {
        ($name, include_str!(concat!("../shaders/", $name, ".glsl")))
    };
}

/// Embedded `(effect name, fragment source)` pairs.
pub const SHADERS: &[(&str, &str)] = &[
    shader!("grayscale"),
    shader!("tint"),
    shader!("invert"),
    shader!("brightness_contrast"),
    shader!("posterize"),
    shader!("channel_shift"),
    shader!("scanlines"),
    shader!("pixelate"),
    shader!("vaporwave"),
    shader!("vignette"),
    shader!("kaleidoscope"),
    shader!("neon_edge"),
    shader!("wave"),
    shader!("box_blur"),
];

/// Definitions of the built-in effects, in listing order.
pub fn definitions() -> Vec<EffectDefinition> {
    vec![
        EffectDefinition::new("grayscale", "Grayscale", Category::Color)
            .with_description("Desaturates the image using Rec. 601 luma weights.")
            .with_parameter("amount", ParameterSpec::scalar("Amount", 1.0, 0.0, 1.0, 0.01))
            .with_spec_defaults(),
        EffectDefinition::new("tint", "Tint", Category::Color)
            .with_description("Multiplies every pixel by a color.")
            .with_parameter(
                "tint",
                ParameterSpec::vec3("Tint", [1.0, 1.0, 1.0], 0.0, 4.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("invert", "Invert", Category::Color)
            .with_description("Inverts the color channels.")
            .with_parameter("amount", ParameterSpec::scalar("Amount", 1.0, 0.0, 1.0, 0.01))
            .with_spec_defaults(),
        EffectDefinition::new("brightness_contrast", "Brightness / Contrast", Category::Color)
            .with_description("Offsets brightness and scales contrast around mid-gray.")
            .with_parameter(
                "brightness",
                ParameterSpec::scalar("Brightness", 0.0, -1.0, 1.0, 0.01),
            )
            .with_parameter(
                "contrast",
                ParameterSpec::scalar("Contrast", 1.0, 0.0, 4.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("posterize", "Posterize", Category::Stylize)
            .with_description("Quantizes each channel to a small number of levels.")
            .with_parameter("levels", ParameterSpec::scalar("Levels", 6.0, 2.0, 64.0, 1.0))
            .with_spec_defaults(),
        EffectDefinition::new("channel_shift", "Channel Shift", Category::Glitch)
            .with_description("Splits the red and blue channels apart by a pixel offset.")
            .with_parameter(
                "offset",
                ParameterSpec::vec2("Offset (px)", [5.0, 0.0], -64.0, 64.0, 1.0),
            )
            .with_spec_defaults(),
        EffectDefinition::new("scanlines", "Scanlines", Category::Glitch)
            .with_description("Darkens every n-th row like a CRT.")
            .with_parameter("spacing", ParameterSpec::scalar("Spacing", 4.0, 1.0, 64.0, 1.0))
            .with_parameter(
                "intensity",
                ParameterSpec::scalar("Intensity", 0.7, 0.0, 1.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("pixelate", "Pixelate", Category::Stylize)
            .with_description("Mosaic of square blocks.")
            .with_parameter(
                "block_size",
                ParameterSpec::scalar("Block size (px)", 8.0, 1.0, 256.0, 1.0),
            )
            .with_spec_defaults(),
        EffectDefinition::new("vaporwave", "Vaporwave", Category::Stylize)
            .with_description("Hue rotation, boosted saturation and a bright grid overlay.")
            .with_parameter(
                "hue_shift",
                ParameterSpec::scalar("Hue shift", 0.8, 0.0, 1.0, 0.01),
            )
            .with_parameter(
                "saturation",
                ParameterSpec::scalar("Saturation", 1.5, 0.0, 4.0, 0.01),
            )
            .with_parameter("gamma", ParameterSpec::scalar("Gamma", 0.8, 0.1, 4.0, 0.01))
            .with_parameter("grid", ParameterSpec::toggle("Grid", true))
            .with_parameter(
                "grid_spacing",
                ParameterSpec::scalar("Grid spacing (px)", 20.0, 2.0, 256.0, 1.0),
            )
            .with_parameter(
                "grid_boost",
                ParameterSpec::scalar("Grid boost", 0.2, 0.0, 1.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("vignette", "Vignette", Category::Stylize)
            .with_description("Darkens the corners.")
            .with_parameter("radius", ParameterSpec::scalar("Radius", 0.75, 0.0, 1.5, 0.01))
            .with_parameter(
                "softness",
                ParameterSpec::scalar("Softness", 0.45, 0.01, 1.0, 0.01),
            )
            .with_parameter(
                "strength",
                ParameterSpec::scalar("Strength", 1.0, 0.0, 1.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("kaleidoscope", "Kaleidoscope", Category::Distortion)
            .with_description("Mirrors the image into radial segments.")
            .with_parameter(
                "segments",
                ParameterSpec::scalar("Segments", 6.0, 2.0, 32.0, 1.0),
            )
            .with_parameter(
                "rotation",
                ParameterSpec::scalar("Rotation", 0.0, 0.0, std::f32::consts::TAU, 0.01),
            )
            .with_parameter(
                "center",
                ParameterSpec::vec2("Center", [0.5, 0.5], 0.0, 1.0, 0.01),
            )
            .with_spec_defaults(),
        EffectDefinition::new("neon_edge", "Neon Edge", Category::Stylize)
            .with_description("Sobel edge detection with a colored glow.")
            .with_parameter(
                "threshold",
                ParameterSpec::scalar("Threshold", 0.1, 0.0, 1.0, 0.01),
            )
            .with_parameter(
                "glow_color",
                ParameterSpec::vec3("Glow color", [1.0, 0.2, 0.9], 0.0, 1.0, 0.01),
            )
            .with_parameter(
                "mode",
                ParameterSpec::choice("Mode", &["overlay", "edges_only"], 0),
            )
            .with_spec_defaults(),
        EffectDefinition::new("wave", "Wave", Category::Distortion)
            .with_description("Animated horizontal sine displacement.")
            .with_parameter(
                "amplitude",
                ParameterSpec::scalar("Amplitude", 0.02, 0.0, 0.2, 0.001),
            )
            .with_parameter(
                "frequency",
                ParameterSpec::scalar("Frequency", 10.0, 0.0, 100.0, 0.1),
            )
            .with_parameter("speed", ParameterSpec::scalar("Speed", 1.0, 0.0, 20.0, 0.1))
            .with_spec_defaults(),
        EffectDefinition::new("box_blur", "Box Blur", Category::Blur)
            .with_description("Nine-tap box blur with adjustable tap spacing.")
            .with_parameter("radius", ParameterSpec::scalar("Radius (px)", 1.0, 0.0, 8.0, 0.1))
            .with_spec_defaults(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_shader_defines_the_entry_point() {
        for (name, source) in SHADERS {
            assert!(
                source.contains("void mainEffect(out vec4 fragColor, in vec2 uv)"),
                "{name} lacks mainEffect"
            );
            assert!(!source.contains("#version"), "{name} should not pin a version");
        }
    }

    #[test]
    fn every_definition_has_a_shader() {
        let names: Vec<&str> = SHADERS.iter().map(|(name, _)| *name).collect();
        let definitions = definitions();
        assert_eq!(definitions.len(), SHADERS.len());
        for definition in definitions {
            assert!(names.contains(&definition.name.as_str()), "{}", definition.name);
        }
    }

    #[test]
    fn every_category_is_represented() {
        let definitions = definitions();
        for category in Category::ALL {
            assert!(
                definitions.iter().any(|d| d.category == category),
                "no built-in effect in {category}"
            );
        }
    }
}
