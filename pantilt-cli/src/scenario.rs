// Detection scenarios replayed by the simulated rig

use anyhow::{Context, Result};
use pantilt_core::{BoundingBox, Detection, PetClass};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Replay from the start once exhausted
    #[serde(default)]
    pub looping: bool,
    pub frames: Vec<ScenarioFrame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioFrame {
    #[serde(default)]
    pub detections: Vec<ScenarioDetection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDetection {
    pub class: PetClass,
    pub confidence: f32,
    /// Bounding-box centre in pixels
    pub center: (f32, f32),
    #[serde(default = "default_size")]
    pub size: (f32, f32),
}

fn default_size() -> (f32, f32) {
    (80.0, 60.0)
}

impl Scenario {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        Ok(scenario)
    }

    /// A cat circling the frame, a gap long enough to lose it, then a dog
    /// drifting across
    pub fn wandering(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let mut frames = Vec::new();

        frames.extend((0..10).map(|_| ScenarioFrame::default()));

        for i in 0..40 {
            let phase = i as f32 * 0.15;
            frames.push(ScenarioFrame {
                detections: vec![ScenarioDetection {
                    class: PetClass::Cat,
                    confidence: 0.82,
                    center: (
                        w / 2.0 + 0.25 * w * phase.cos(),
                        h / 2.0 + 0.15 * h * phase.sin(),
                    ),
                    size: (0.15 * w, 0.2 * h),
                }],
            });
        }

        frames.extend((0..14).map(|_| ScenarioFrame::default()));

        for i in 0..30 {
            let x = 0.15 * w + i as f32 * 0.02 * w;
            frames.push(ScenarioFrame {
                detections: vec![ScenarioDetection {
                    class: PetClass::Dog,
                    confidence: 0.9,
                    center: (x.min(w - 1.0), 0.55 * h),
                    size: (0.25 * w, 0.25 * h),
                }],
            });
        }

        Self {
            looping: true,
            frames,
        }
    }

    /// Per-frame detection lists for a scripted detector
    pub fn into_script(self) -> Result<Vec<Vec<Detection>>> {
        self.frames
            .into_iter()
            .enumerate()
            .map(|(index, frame)| {
                frame
                    .detections
                    .into_iter()
                    .map(|d| {
                        let bbox =
                            BoundingBox::centered(d.center.0, d.center.1, d.size.0, d.size.1)?;
                        Ok(Detection::new(d.class, d.confidence, bbox)?)
                    })
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("invalid detection in scenario frame {}", index))
            })
            .collect()
    }
}
