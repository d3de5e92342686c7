//! Asynchronous image and terrain loading.
//!
//! Requests are decoded on a worker thread (or inline, for tests) and handed
//! back through [`AssetLoader::poll`] on the frame-loop thread. Every request
//! carries a [`CancellationToken`] captured at load start; a completion whose
//! token was cancelled in the meantime is dropped instead of applied.

use crate::scene::terrain::{Terrain, TerrainLayout, TerrainSource};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageSource {
    /// The configured default flower image.
    Default,
    File(PathBuf),
    /// An already-encoded image, e.g. the output of a drawing tool.
    Encoded(Arc<[u8]>),
}

impl ImageSource {
    fn describe(&self) -> String {
        match self {
            ImageSource::Default => "default image".to_string(),
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Encoded(bytes) => format!("encoded image ({} bytes)", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Decode on a worker thread.
    Background,
    /// Decode at request time; results still surface through `poll`.
    Inline,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: image::ImageError,
    },
    #[error("asset worker stopped before finishing {what}")]
    WorkerGone { what: String },
    #[error("load {0:?} was cancelled before it started")]
    Cancelled(LoadId),
}

#[derive(Debug)]
pub enum LoadedAsset {
    Image { width: u32, height: u32 },
    Terrain(Terrain),
}

#[derive(Debug)]
pub struct Completion {
    pub id: LoadId,
    pub result: Result<LoadedAsset, AssetError>,
}

enum Job {
    Image {
        id: LoadId,
        token: CancellationToken,
        source: ImageSource,
        default_image: PathBuf,
    },
    Terrain {
        id: LoadId,
        token: CancellationToken,
        source: TerrainSource,
        layout: TerrainLayout,
    },
}

impl Job {
    fn id(&self) -> LoadId {
        match self {
            Job::Image { id, .. } | Job::Terrain { id, .. } => *id,
        }
    }

    fn is_cancelled(&self) -> bool {
        match self {
            Job::Image { token, .. } | Job::Terrain { token, .. } => token.is_cancelled(),
        }
    }

    /// Decodes the asset unless its token was cancelled while queued.
    fn run(self) -> Completion {
        if self.is_cancelled() {
            let id = self.id();
            log::trace!("Skipping cancelled load {:?}", id);
            return Completion {
                id,
                result: Err(AssetError::Cancelled(id)),
            };
        }
        match self {
            Job::Image {
                id,
                source,
                default_image,
                ..
            } => Completion {
                id,
                result: decode_dimensions(&source, &default_image)
                    .map(|(width, height)| LoadedAsset::Image { width, height }),
            },
            Job::Terrain {
                id, source, layout, ..
            } => Completion {
                id,
                result: build_terrain(&source, layout).map(LoadedAsset::Terrain),
            },
        }
    }
}

struct Pending {
    token: CancellationToken,
    cache_key: Option<String>,
}

pub struct AssetLoader {
    mode: LoadMode,
    default_image: PathBuf,
    next_id: u64,
    pending: HashMap<LoadId, Pending>,
    ready: VecDeque<Completion>,
    jobs: Option<Sender<Job>>,
    results_tx: Sender<Completion>,
    results_rx: Receiver<Completion>,
    // Image dimensions keyed by the SHA-256 of the source.
    dimension_cache: HashMap<String, (u32, u32)>,
}

impl AssetLoader {
    pub fn new(mode: LoadMode, default_image: impl Into<PathBuf>) -> Self {
        let (results_tx, results_rx) = mpsc::channel();
        Self {
            mode,
            default_image: default_image.into(),
            next_id: 0,
            pending: HashMap::new(),
            ready: VecDeque::new(),
            jobs: None,
            results_tx,
            results_rx,
            dimension_cache: HashMap::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn request_image(&mut self, source: ImageSource, token: CancellationToken) -> LoadId {
        let id = self.allocate_id();
        let cache_key = self.cache_key(&source);
        if let Some(&(width, height)) = self.dimension_cache.get(&cache_key) {
            log::trace!("Image {} served from cache", source.describe());
            self.pending.insert(
                id,
                Pending {
                    token,
                    cache_key: None,
                },
            );
            self.ready.push_back(Completion {
                id,
                result: Ok(LoadedAsset::Image { width, height }),
            });
            return id;
        }

        self.pending.insert(
            id,
            Pending {
                token: token.clone(),
                cache_key: Some(cache_key),
            },
        );
        self.submit(Job::Image {
            id,
            token,
            source,
            default_image: self.default_image.clone(),
        });
        id
    }

    pub fn request_terrain(
        &mut self,
        source: TerrainSource,
        layout: TerrainLayout,
        token: CancellationToken,
    ) -> LoadId {
        let id = self.allocate_id();
        self.pending.insert(
            id,
            Pending {
                token: token.clone(),
                cache_key: None,
            },
        );
        self.submit(Job::Terrain {
            id,
            token,
            source,
            layout,
        });
        id
    }

    /// Completions whose token is still live. Never blocks.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut finished: Vec<Completion> = self.ready.drain(..).collect();
        finished.extend(self.results_rx.try_iter());

        let mut live = Vec::with_capacity(finished.len());
        for completion in finished {
            let Some(pending) = self.pending.remove(&completion.id) else {
                continue;
            };
            if let (Some(key), Ok(LoadedAsset::Image { width, height })) =
                (pending.cache_key, &completion.result)
            {
                self.dimension_cache.insert(key, (*width, *height));
            }
            if pending.token.is_cancelled() {
                log::trace!("Dropping cancelled load {:?}", completion.id);
                continue;
            }
            live.push(completion);
        }
        live
    }

    fn allocate_id(&mut self) -> LoadId {
        self.next_id += 1;
        LoadId(self.next_id)
    }

    fn cache_key(&self, source: &ImageSource) -> String {
        let mut hasher = Sha256::new();
        match source {
            ImageSource::Default => {
                hasher.update(b"default:");
                hasher.update(self.default_image.to_string_lossy().as_bytes());
            }
            ImageSource::File(path) => {
                hasher.update(b"file:");
                hasher.update(path.to_string_lossy().as_bytes());
            }
            ImageSource::Encoded(bytes) => {
                hasher.update(b"bytes:");
                hasher.update(bytes);
            }
        }
        format!("{:x}", hasher.finalize())
    }

    fn submit(&mut self, job: Job) {
        if self.mode == LoadMode::Inline {
            self.ready.push_back(job.run());
            return;
        }

        let sender = self.jobs.get_or_insert_with(|| spawn_worker(self.results_tx.clone()));
        if let Err(mpsc::SendError(job)) = sender.send(job) {
            let id = job.id();
            log::warn!("Asset worker unavailable, dropping load {:?}", id);
            self.jobs = None;
            self.ready.push_back(Completion {
                id,
                result: Err(AssetError::WorkerGone {
                    what: format!("{:?}", id),
                }),
            });
        }
    }
}

fn spawn_worker(results: Sender<Completion>) -> Sender<Job> {
    let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
    let spawned = thread::Builder::new()
        .name("meadow-assets".to_string())
        .spawn(move || {
            for job in jobs_rx {
                if results.send(job.run()).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        log::warn!("Failed to spawn asset worker: {}", err);
    }
    jobs_tx
}

fn decode_dimensions(source: &ImageSource, default_image: &Path) -> Result<(u32, u32), AssetError> {
    match source {
        ImageSource::Default => match probe_file(default_image) {
            Ok(dimensions) => Ok(dimensions),
            Err(err) => {
                log::warn!("Default flower image unavailable ({}), using a square", err);
                Ok((1, 1))
            }
        },
        ImageSource::File(path) => probe_file(path),
        ImageSource::Encoded(bytes) => image::ImageReader::new(Cursor::new(bytes.as_ref()))
            .with_guessed_format()
            .map_err(|source| AssetError::Read {
                path: "<encoded>".to_string(),
                source,
            })?
            .into_dimensions()
            .map_err(|source| AssetError::Decode {
                what: "encoded image".to_string(),
                source,
            }),
    }
}

fn probe_file(path: &Path) -> Result<(u32, u32), AssetError> {
    image::image_dimensions(path).map_err(|source| match source {
        image::ImageError::IoError(source) => AssetError::Read {
            path: path.display().to_string(),
            source,
        },
        source => AssetError::Decode {
            what: path.display().to_string(),
            source,
        },
    })
}

fn build_terrain(source: &TerrainSource, layout: TerrainLayout) -> Result<Terrain, AssetError> {
    match source {
        TerrainSource::Procedural {
            size,
            resolution,
            amplitude,
        } => Ok(Terrain::procedural(*size, *resolution, *amplitude, layout)),
        TerrainSource::Heightmap {
            path,
            size,
            resolution,
            height,
        } => {
            let image = image::open(path).map_err(|source| AssetError::Decode {
                what: path.display().to_string(),
                source,
            })?;
            Ok(Terrain::from_heightmap(
                &image.to_luma8(),
                *size,
                *resolution,
                *height,
                layout,
            ))
        }
    }
}

#[cfg(test)]
pub(crate) fn encode_test_png(width: u32, height: u32) -> Arc<[u8]> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 90, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("png encode");
    bytes.into_inner().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn image_dims(completion: &Completion) -> (u32, u32) {
        match &completion.result {
            Ok(LoadedAsset::Image { width, height }) => (*width, *height),
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn inline_load_surfaces_on_poll() {
        let mut loader = AssetLoader::new(LoadMode::Inline, "missing.png");
        let id = loader.request_image(ImageSource::Encoded(encode_test_png(4, 2)), CancellationToken::new());
        assert_eq!(loader.pending_count(), 1);
        let completions = loader.poll();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].id, id);
        assert_eq!(image_dims(&completions[0]), (4, 2));
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn cancelled_load_is_dropped() {
        let mut loader = AssetLoader::new(LoadMode::Inline, "missing.png");
        let token = CancellationToken::new();
        loader.request_image(ImageSource::Encoded(encode_test_png(2, 2)), token.clone());
        token.cancel();
        assert!(loader.poll().is_empty());
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn queued_job_is_skipped_once_cancelled() {
        let token = CancellationToken::new();
        let job = Job::Image {
            id: LoadId(7),
            token: token.clone(),
            source: ImageSource::Encoded(encode_test_png(2, 2)),
            default_image: PathBuf::from("missing.png"),
        };
        token.cancel();
        let completion = job.run();
        assert_eq!(completion.id, LoadId(7));
        assert!(matches!(completion.result, Err(AssetError::Cancelled(LoadId(7)))));
    }

    #[test]
    fn cancelled_background_load_leaves_nothing_pending() {
        let mut loader = AssetLoader::new(LoadMode::Background, "missing.png");
        let token = CancellationToken::new();
        token.cancel();
        loader.request_terrain(
            TerrainSource::Procedural {
                size: 4.0,
                resolution: 4,
                amplitude: 0.0,
            },
            TerrainLayout::default(),
            token,
        );
        let deadline = Instant::now() + Duration::from_secs(5);
        while loader.pending_count() > 0 && Instant::now() < deadline {
            assert!(loader.poll().is_empty());
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn repeated_source_hits_cache() {
        let mut loader = AssetLoader::new(LoadMode::Inline, "missing.png");
        let bytes = encode_test_png(3, 6);
        loader.request_image(ImageSource::Encoded(bytes.clone()), CancellationToken::new());
        loader.poll();
        assert_eq!(loader.dimension_cache.len(), 1);
        loader.request_image(ImageSource::Encoded(bytes), CancellationToken::new());
        let completions = loader.poll();
        assert_eq!(image_dims(&completions[0]), (3, 6));
        assert_eq!(loader.dimension_cache.len(), 1);
    }

    #[test]
    fn missing_default_image_falls_back_to_square() {
        let mut loader = AssetLoader::new(LoadMode::Inline, "definitely/not/here.png");
        loader.request_image(ImageSource::Default, CancellationToken::new());
        let completions = loader.poll();
        assert_eq!(image_dims(&completions[0]), (1, 1));
    }

    #[test]
    fn missing_file_reports_error() {
        let mut loader = AssetLoader::new(LoadMode::Inline, "missing.png");
        loader.request_image(ImageSource::File("no/such/flower.png".into()), CancellationToken::new());
        let completions = loader.poll();
        assert!(completions[0].result.is_err());
    }

    #[test]
    fn background_terrain_load_completes() {
        let mut loader = AssetLoader::new(LoadMode::Background, "missing.png");
        let source = TerrainSource::Procedural {
            size: 4.0,
            resolution: 4,
            amplitude: 0.2,
        };
        let id = loader.request_terrain(source, TerrainLayout::default(), CancellationToken::new());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut completions = Vec::new();
        while completions.is_empty() && Instant::now() < deadline {
            completions = loader.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].id, id);
        assert!(matches!(completions[0].result, Ok(LoadedAsset::Terrain(_))));
    }
}
