use serde::{Deserialize, Serialize};

/// How an image is fitted into a `width` x `height` box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fit {
    /// Fit inside the box, keeping the aspect ratio.
    #[default]
    Contain,
    /// Like `Contain` but never upscales.
    Max,
    /// Fit inside the box and pad the rest with white.
    Fill,
    /// Resize to the exact box, ignoring the aspect ratio.
    Stretch,
    /// Cover the box and crop the overflow around the center.
    Crop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropPosition {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Both,
}

/// A single transform step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Manipulation {
    Width { width: u32 },
    Height { height: u32 },
    Fit { fit: Fit, width: u32, height: u32 },
    Crop { position: CropPosition, width: u32, height: u32 },
    ManualCrop { width: u32, height: u32, x: u32, y: u32 },
    Rotate { degrees: u16 },
    Flip { direction: FlipDirection },
    Greyscale,
    Sepia,
    Blur { amount: f32 },
    Sharpen { amount: f32 },
    Brightness { amount: i32 },
    Contrast { amount: f32 },
    Format { format: String },
    Quality { quality: u8 },
}

impl Manipulation {
    pub fn name(&self) -> &'static str {
        match self {
            Manipulation::Width { .. } => "width",
            Manipulation::Height { .. } => "height",
            Manipulation::Fit { .. } => "fit",
            Manipulation::Crop { .. } => "crop",
            Manipulation::ManualCrop { .. } => "manual_crop",
            Manipulation::Rotate { .. } => "rotate",
            Manipulation::Flip { .. } => "flip",
            Manipulation::Greyscale => "greyscale",
            Manipulation::Sepia => "sepia",
            Manipulation::Blur { .. } => "blur",
            Manipulation::Sharpen { .. } => "sharpen",
            Manipulation::Brightness { .. } => "brightness",
            Manipulation::Contrast { .. } => "contrast",
            Manipulation::Format { .. } => "format",
            Manipulation::Quality { .. } => "quality",
        }
    }
}

/// Ordered manipulation chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manipulations(Vec<Manipulation>);

impl Manipulations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: Manipulation) -> Self {
        self.0.push(step);
        self
    }

    pub fn push(&mut self, step: Manipulation) {
        self.0.push(step);
    }

    /// Put `other`'s steps ahead of this chain's own.
    pub fn prepend(&mut self, other: &Manipulations) {
        let mut steps = other.0.clone();
        steps.append(&mut self.0);
        self.0 = steps;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn steps(&self) -> &[Manipulation] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Manipulation> {
        self.0.iter()
    }

    /// Output format requested by the last `format` step.
    pub fn format(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|step| match step {
            Manipulation::Format { format } => Some(format.as_str()),
            _ => None,
        })
    }

    /// Replace every `format` step with a single one at the end of the chain.
    pub fn set_format(&mut self, format: impl Into<String>) {
        self.0
            .retain(|step| !matches!(step, Manipulation::Format { .. }));
        self.0.push(Manipulation::Format {
            format: format.into(),
        });
    }

    pub fn quality(&self) -> Option<u8> {
        self.0.iter().rev().find_map(|step| match step {
            Manipulation::Quality { quality } => Some(*quality),
            _ => None,
        })
    }
}

impl From<Vec<Manipulation>> for Manipulations {
    fn from(steps: Vec<Manipulation>) -> Self {
        Self(steps)
    }
}

impl FromIterator<Manipulation> for Manipulations {
    fn from_iter<I: IntoIterator<Item = Manipulation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ad-hoc chain stored on a media record for one conversion (or `*`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationOverride {
    pub conversion: String,
    pub manipulations: Manipulations,
}

/// Ordered map of conversion name to ad-hoc chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManipulationOverrides(Vec<ManipulationOverride>);

impl ManipulationOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the chain for `conversion`, keeping its original position.
    pub fn insert(&mut self, conversion: impl Into<String>, manipulations: Manipulations) {
        let conversion = conversion.into();
        match self.0.iter_mut().find(|entry| entry.conversion == conversion) {
            Some(entry) => entry.manipulations = manipulations,
            None => self.0.push(ManipulationOverride {
                conversion,
                manipulations,
            }),
        }
    }

    pub fn with(mut self, conversion: impl Into<String>, manipulations: Manipulations) -> Self {
        self.insert(conversion, manipulations);
        self
    }

    pub fn get(&self, conversion: &str) -> Option<&Manipulations> {
        self.0
            .iter()
            .find(|entry| entry.conversion == conversion)
            .map(|entry| &entry.manipulations)
    }

    pub fn remove(&mut self, conversion: &str) -> Option<Manipulations> {
        let index = self.0.iter().position(|entry| entry.conversion == conversion)?;
        Some(self.0.remove(index).manipulations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManipulationOverride> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_puts_steps_first() {
        let mut chain = Manipulations::new().with(Manipulation::Width { width: 10 });
        let overlay = Manipulations::new().with(Manipulation::Greyscale);
        chain.prepend(&overlay);
        assert_eq!(
            chain.steps(),
            &[Manipulation::Greyscale, Manipulation::Width { width: 10 }]
        );
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn set_format_replaces_previous_format() {
        let mut chain = Manipulations::new()
            .with(Manipulation::Format {
                format: "jpg".to_string(),
            })
            .with(Manipulation::Width { width: 10 });
        chain.set_format("png");
        assert_eq!(chain.format(), Some("png"));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn overrides_replace_in_place() {
        let mut overrides = ManipulationOverrides::new()
            .with("thumb", Manipulations::new().with(Manipulation::Greyscale))
            .with("*", Manipulations::new().with(Manipulation::Sepia));
        overrides.insert("thumb", Manipulations::new().with(Manipulation::Sepia));

        let names: Vec<&str> = overrides.iter().map(|o| o.conversion.as_str()).collect();
        assert_eq!(names, vec!["thumb", "*"]);
        assert_eq!(
            overrides.get("thumb").map(|m| m.steps().to_vec()),
            Some(vec![Manipulation::Sepia])
        );
    }

    #[test]
    fn serializes_with_op_tag() {
        let chain = Manipulations::new().with(Manipulation::Fit {
            fit: Fit::Crop,
            width: 20,
            height: 10,
        });
        let json = serde_json::to_value(&chain).unwrap();
        assert_eq!(json[0]["op"], "fit");
        assert_eq!(json[0]["fit"], "crop");
    }
}
