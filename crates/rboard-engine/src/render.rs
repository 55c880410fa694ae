//! Shot rendering orchestration.
//!
//! Rendering is deliberately sequential: shot N's render starts only after
//! shot N−1 has terminated, because N reuses N−1's rendered frame as a
//! continuity reference. A single shot's failure is isolated; siblings
//! still attempt their renders.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use rboard_ai::{generate, ImageCapability, ImageOutput, PromptPart, TextCapability};
use rboard_models::{ShotPlan, VisualBreakdown};
use rboard_store::MediaStore;

use crate::error::{EngineError, EngineResult};
use crate::planner::ShotAnchors;
use crate::prompts;
use crate::refs::resolve_references;
use crate::registry::EntityRegistry;

/// Result of rendering one shot.
#[derive(Debug, Clone)]
pub struct RenderedShot {
    pub locator: String,
    /// The shot with references remapped and the locator attached
    pub shot: ShotPlan,
}

/// Per-shot outcome of a sequence render.
#[derive(Debug, Clone)]
pub struct ShotRenderResult {
    pub shot: ShotPlan,
    pub error: Option<String>,
}

/// Result of an edit call: a new locator and the breakdown with the
/// instruction merged in.
#[derive(Debug, Clone)]
pub struct EditedShot {
    pub locator: String,
    pub visual_breakdown: VisualBreakdown,
}

/// Called after each shot of a sequence render with (completed, total).
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// Renders shots against the image capability and persists results.
pub struct ShotRenderer {
    text: Arc<dyn TextCapability>,
    image: Arc<dyn ImageCapability>,
    store: Arc<dyn MediaStore>,
    aspect: String,
}

impl ShotRenderer {
    pub fn new(
        text: Arc<dyn TextCapability>,
        image: Arc<dyn ImageCapability>,
        store: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            text,
            image,
            store,
            aspect: "16:9".to_string(),
        }
    }

    pub fn with_aspect(mut self, aspect: impl Into<String>) -> Self {
        self.aspect = aspect.into();
        self
    }

    /// Render one shot: resolve references, call the image capability,
    /// persist the result, attach the locator.
    pub async fn render_shot(
        &self,
        shot: &ShotPlan,
        registry: &EntityRegistry,
        anchors: &ShotAnchors,
    ) -> EngineResult<RenderedShot> {
        let resolved =
            resolve_references(shot, registry, self.store.as_ref(), anchors).await?;

        // Prompt text first, then images in tag order.
        let mut parts = vec![PromptPart::Text(resolved.prompt.clone())];
        for image in &resolved.images {
            parts.push(PromptPart::Image {
                bytes: image.bytes.clone(),
                mime_type: image.mime_type.clone(),
            });
        }

        let output = self.image.generate_image(&parts, &self.aspect).await?;

        let locator = match output {
            ImageOutput::Bytes { data, mime_type } => {
                self.store
                    .save(&format!("shots/{}", shot.shot_id), data, &mime_type)
                    .await?
            }
            // External URLs are stored verbatim as the shot's locator.
            ImageOutput::Url(url) => url,
        };

        let mut rendered = resolved.shot;
        rendered.mark_rendered(&locator);
        info!("Rendered shot {} -> {}", shot.shot_id, locator);

        Ok(RenderedShot {
            locator,
            shot: rendered,
        })
    }

    /// Render a sequence shot by shot, threading each rendered frame into
    /// the next shot's anchors. Already-rendered shots are skipped. A
    /// failing shot is recorded and its siblings continue.
    pub async fn render_sequence(
        &self,
        shots: &[ShotPlan],
        registry: &EntityRegistry,
        progress: Option<ProgressFn>,
    ) -> Vec<ShotRenderResult> {
        let total = shots.len();
        let master_index = shots.iter().position(|s| s.is_master()).unwrap_or(0);

        let mut master_url: Option<String> = shots
            .get(master_index)
            .and_then(|s| s.image_url.clone());
        let mut previous_url: Option<String> = None;
        let mut results = Vec::with_capacity(total);

        for (index, shot) in shots.iter().enumerate() {
            if shot.is_rendered() {
                previous_url = shot.image_url.clone();
                if index == master_index {
                    master_url = shot.image_url.clone();
                }
                results.push(ShotRenderResult {
                    shot: shot.clone(),
                    error: None,
                });
                if let Some(report) = &progress {
                    report(index + 1, total);
                }
                continue;
            }

            // The master shot never anchors on itself, and a predecessor
            // that IS the master frame is not attached twice.
            let master_for_shot = if index == master_index {
                None
            } else {
                master_url.clone()
            };
            let previous_for_shot = match (&master_for_shot, &previous_url) {
                (Some(master), Some(previous)) if master == previous => None,
                _ => previous_url.clone(),
            };
            let anchors = ShotAnchors {
                master_url: master_for_shot,
                previous_url: previous_for_shot,
            };

            match self.render_shot(shot, registry, &anchors).await {
                Ok(rendered) => {
                    if index == master_index {
                        master_url = Some(rendered.locator.clone());
                    }
                    previous_url = Some(rendered.locator.clone());
                    results.push(ShotRenderResult {
                        shot: rendered.shot,
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("Shot {} failed to render: {}", shot.shot_id, e);
                    let mut failed = shot.clone();
                    failed.loading = false;
                    // The immediate predecessor of the next shot has no
                    // image; it renders without a previous anchor.
                    previous_url = None;
                    results.push(ShotRenderResult {
                        shot: failed,
                        error: Some(e.to_string()),
                    });
                }
            }

            if let Some(report) = &progress {
                report(index + 1, total);
            }
        }

        results
    }

    /// Edit an already-rendered shot: generate a new image from the current
    /// one plus the instruction, and merge the instruction into the
    /// breakdown. Both results are required.
    pub async fn edit_shot(
        &self,
        locator: &str,
        instruction: &str,
        shot: &ShotPlan,
    ) -> EngineResult<EditedShot> {
        if instruction.trim().is_empty() {
            return Err(EngineError::invalid_input("edit instruction is empty"));
        }

        let current = self.store.get(locator).await?;

        let parts = vec![
            PromptPart::Text(format!(
                "Edit this storyboard frame: {}. Keep composition, characters and style otherwise unchanged.",
                instruction
            )),
            PromptPart::Image {
                bytes: current.bytes,
                mime_type: current.mime_type,
            },
        ];

        let output = self.image.generate_image(&parts, &self.aspect).await?;
        let new_locator = match output {
            ImageOutput::Bytes { data, mime_type } => {
                self.store
                    .save(
                        &format!("shots/{}-edit-{}", shot.shot_id, Uuid::new_v4()),
                        data,
                        &mime_type,
                    )
                    .await?
            }
            ImageOutput::Url(url) => url,
        };

        let breakdown_json = serde_json::to_string(&shot.visual_breakdown)?;
        let updated: VisualBreakdown = generate(
            self.text.as_ref(),
            &prompts::edit_breakdown_prompt(instruction, &breakdown_json),
        )
        .await?;

        info!("Edited shot {} -> {}", shot.shot_id, new_locator);
        Ok(EditedShot {
            locator: new_locator,
            visual_breakdown: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rboard_ai::{AiError, AiResult};
    use rboard_models::{PlanType, ShotRole};
    use rboard_store::MemoryMediaStore;
    use std::sync::Mutex;

    /// Image stub that records the image-part count of every call and can
    /// fail a specific call.
    struct CountingImage {
        image_counts: Mutex<Vec<usize>>,
        fail_call: Option<usize>,
    }

    impl CountingImage {
        fn new(fail_call: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                image_counts: Mutex::new(Vec::new()),
                fail_call,
            })
        }

        fn counts(&self) -> Vec<usize> {
            self.image_counts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageCapability for CountingImage {
        async fn generate_image(
            &self,
            parts: &[PromptPart],
            _aspect: &str,
        ) -> AiResult<ImageOutput> {
            let call_index = {
                let mut counts = self.image_counts.lock().unwrap();
                counts.push(parts.iter().filter(|p| p.is_image()).count());
                counts.len() - 1
            };
            if self.fail_call == Some(call_index) {
                return Err(AiError::unavailable("synthetic failure"));
            }
            Ok(ImageOutput::Bytes {
                data: format!("frame-{}", call_index).into_bytes(),
                mime_type: "image/png".to_string(),
            })
        }
    }

    struct FixedText(serde_json::Value);

    #[async_trait]
    impl TextCapability for FixedText {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _schema: serde_json::Value,
        ) -> AiResult<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    fn plain_shot(id: &str, role: ShotRole) -> ShotPlan {
        let breakdown: VisualBreakdown = serde_json::from_value(serde_json::json!({
            "scene": {"environment": "Kitchen", "time_of_day": "day"},
            "framing": "wide"
        }))
        .unwrap();
        let mut shot = ShotPlan::new(PlanType::Sequence, role, "action", breakdown);
        shot.shot_id = id.to_string();
        shot
    }

    fn renderer(image: Arc<CountingImage>, store: Arc<MemoryMediaStore>) -> ShotRenderer {
        let text = Arc::new(FixedText(serde_json::json!({
            "scene": {"environment": "Kitchen", "time_of_day": "day"},
            "framing": "wide"
        })));
        ShotRenderer::new(text, image, store)
    }

    #[tokio::test]
    async fn test_render_shot_persists_and_attaches_locator() {
        let image = CountingImage::new(None);
        let store = Arc::new(MemoryMediaStore::new());
        let renderer = renderer(Arc::clone(&image), Arc::clone(&store));
        let registry = EntityRegistry::new(Vec::new(), Vec::new());

        let shot = plain_shot("s1", ShotRole::Master);
        let rendered = renderer
            .render_shot(&shot, &registry, &ShotAnchors::default())
            .await
            .unwrap();

        assert!(rendered.shot.is_rendered());
        assert!(!rendered.shot.loading);
        let saved = store.get(&rendered.locator).await.unwrap();
        assert_eq!(saved.bytes, b"frame-0");
    }

    #[tokio::test]
    async fn test_sequence_threads_anchors_through_shots() {
        let image = CountingImage::new(None);
        let store = Arc::new(MemoryMediaStore::new());
        let renderer = renderer(Arc::clone(&image), Arc::clone(&store));
        let registry = EntityRegistry::new(Vec::new(), Vec::new());

        let shots = vec![
            plain_shot("s1", ShotRole::Master),
            plain_shot("s2", ShotRole::Sequential),
            plain_shot("s3", ShotRole::Sequential),
        ];

        let results = renderer.render_sequence(&shots, &registry, None).await;
        assert!(results.iter().all(|r| r.error.is_none()));

        // Shot 1: no anchors. Shot 2: master only (master is also the
        // predecessor, deduplicated). Shot 3: master + previous.
        assert_eq!(image.counts(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let image = CountingImage::new(Some(1));
        let store = Arc::new(MemoryMediaStore::new());
        let renderer = renderer(Arc::clone(&image), Arc::clone(&store));
        let registry = EntityRegistry::new(Vec::new(), Vec::new());

        let shots = vec![
            plain_shot("s1", ShotRole::Master),
            plain_shot("s2", ShotRole::Sequential),
            plain_shot("s3", ShotRole::Sequential),
        ];

        let results = renderer
            .render_sequence(
                &shots,
                &registry,
                Some(Box::new(|done, total| {
                    // Progress keeps flowing across the failure.
                    assert!(done <= total);
                })),
            )
            .await;

        assert!(results[0].error.is_none());
        assert!(results[0].shot.is_rendered());

        assert!(results[1].error.is_some());
        assert!(!results[1].shot.is_rendered());
        assert!(!results[1].shot.loading);

        // Shot 3 still rendered: master anchor only, no previous.
        assert!(results[2].error.is_none());
        assert_eq!(image.counts(), vec![0, 1, 1]);
    }

    #[tokio::test]
    async fn test_already_rendered_shots_skipped() {
        let image = CountingImage::new(None);
        let store = Arc::new(MemoryMediaStore::new());
        let master_url = store
            .save("shots/s1", b"existing".to_vec(), "image/png")
            .await
            .unwrap();

        let renderer = renderer(Arc::clone(&image), Arc::clone(&store));
        let registry = EntityRegistry::new(Vec::new(), Vec::new());

        let mut first = plain_shot("s1", ShotRole::Master);
        first.image_url = Some(master_url);
        let shots = vec![first, plain_shot("s2", ShotRole::Sequential)];

        let results = renderer.render_sequence(&shots, &registry, None).await;
        assert!(results.iter().all(|r| r.error.is_none()));
        // Only shot 2 hit the capability, carrying the existing master
        // frame as both master and previous anchor (deduplicated).
        assert_eq!(image.counts(), vec![1]);
    }

    #[tokio::test]
    async fn test_edit_requires_existing_image() {
        let image = CountingImage::new(None);
        let store = Arc::new(MemoryMediaStore::new());
        let renderer = renderer(image, store);

        let shot = plain_shot("s1", ShotRole::Master);
        let result = renderer.edit_shot("mem://missing", "add rain", &shot).await;
        assert!(matches!(result, Err(EngineError::Store(_))));
    }

    #[tokio::test]
    async fn test_edit_returns_new_locator_and_breakdown() {
        let image = CountingImage::new(None);
        let store = Arc::new(MemoryMediaStore::new());
        let locator = store
            .save("shots/s1", b"original".to_vec(), "image/png")
            .await
            .unwrap();
        let renderer = renderer(Arc::clone(&image), Arc::clone(&store));

        let shot = plain_shot("s1", ShotRole::Master);
        let edited = renderer
            .edit_shot(&locator, "make it night", &shot)
            .await
            .unwrap();

        assert_ne!(edited.locator, locator);
        assert!(store.get(&edited.locator).await.is_ok());
        assert_eq!(edited.visual_breakdown.scene.environment, "Kitchen");
    }
}
