use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::cache::Image;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Granted,
    Denied,
    NotDetermined,
}

/// Where saved sprites end up.
#[async_trait]
pub trait GalleryClient: Send + Sync {
    fn authorization_status(&self) -> Authorization;

    async fn request_authorization(&self) -> Authorization;

    /// Persists every image or none of them.
    async fn commit(&self, images: &[Image]) -> Result<()>;
}

/// Saves images into the gallery after making sure access was granted.
#[derive(Clone)]
pub struct SaveToGallery {
    client: Arc<dyn GalleryClient>,
}

impl SaveToGallery {
    pub fn new(client: Arc<dyn GalleryClient>) -> Self {
        Self { client }
    }

    pub async fn save_one(&self, image: Image) -> Result<()> {
        self.save_all(&[image]).await
    }

    pub async fn save_all(&self, images: &[Image]) -> Result<()> {
        self.ensure_authorized().await?;
        self.client.commit(images).await.map_err(|e| match e {
            Error::SaveFailed(_) | Error::Cancelled => e,
            other => Error::save_failed(other),
        })
    }

    async fn ensure_authorized(&self) -> Result<()> {
        let status = match self.client.authorization_status() {
            Authorization::NotDetermined => self.client.request_authorization().await,
            status => status,
        };

        if status == Authorization::Granted {
            Ok(())
        } else {
            log::warn!("gallery access not granted ({status:?})");
            Err(Error::PermissionDenied)
        }
    }
}

/// Gallery backed by a plain directory of PNG files.
///
/// Access counts as granted once the directory exists; requesting access
/// creates it.
pub struct DirectoryGallery {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl DirectoryGallery {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            sequence: AtomicU64::new(0),
        }
    }

    fn next_path(&self, stamp: u128) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("sprite-{stamp}-{seq}.png"))
    }
}

#[async_trait]
impl GalleryClient for DirectoryGallery {
    fn authorization_status(&self) -> Authorization {
        match std::fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => Authorization::Granted,
            Ok(_) => Authorization::Denied,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Authorization::NotDetermined,
            Err(_) => Authorization::Denied,
        }
    }

    async fn request_authorization(&self) -> Authorization {
        match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => Authorization::Granted,
            Err(e) => {
                log::warn!("cannot create gallery directory {}: {e}", self.dir.display());
                Authorization::Denied
            }
        }
    }

    async fn commit(&self, images: &[Image]) -> Result<()> {
        // Encode everything up front so a bad image fails the batch before any write.
        let mut encoded = Vec::with_capacity(images.len());
        for image in images {
            let mut buf = Cursor::new(Vec::new());
            image
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(Error::save_failed)?;
            encoded.push(buf.into_inner());
        }

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let files = encoded
            .into_iter()
            .map(|bytes| (self.next_path(stamp), bytes))
            .collect();
        let saved = write_batch(files).await?;

        log::info!("saved {saved} image(s) to {}", self.dir.display());
        Ok(())
    }
}

/// Writes every file or, on the first failure, removes the ones already
/// written. Returns how many were written.
async fn write_batch(files: Vec<(PathBuf, Vec<u8>)>) -> Result<usize> {
    let mut written: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            log::warn!("failed to write {}: {e}", path.display());
            for done in &written {
                if let Err(e) = tokio::fs::remove_file(done).await {
                    log::warn!("failed to roll back {}: {e}", done.display());
                }
            }
            return Err(Error::save_failed(e));
        }
        written.push(path);
    }
    Ok(written.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::solid_image;
    use parking_lot::Mutex;

    struct StubGallery {
        status: Authorization,
        granted_on_request: bool,
        fail_commit: bool,
        requests: Mutex<usize>,
        commits: Mutex<Vec<usize>>,
    }

    impl StubGallery {
        fn new(status: Authorization) -> Self {
            Self {
                status,
                granted_on_request: false,
                fail_commit: false,
                requests: Mutex::new(0),
                commits: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GalleryClient for StubGallery {
        fn authorization_status(&self) -> Authorization {
            self.status
        }

        async fn request_authorization(&self) -> Authorization {
            *self.requests.lock() += 1;
            if self.granted_on_request {
                Authorization::Granted
            } else {
                Authorization::Denied
            }
        }

        async fn commit(&self, images: &[Image]) -> Result<()> {
            if self.fail_commit {
                return Err(Error::transport(std::io::Error::other("disk full")));
            }
            self.commits.lock().push(images.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn granted_saves_single_and_batch() {
        let gallery = Arc::new(StubGallery::new(Authorization::Granted));
        let saver = SaveToGallery::new(gallery.clone());

        saver.save_one(solid_image(1, 1)).await.unwrap();
        saver
            .save_all(&[solid_image(1, 1), solid_image(2, 2), solid_image(3, 3)])
            .await
            .unwrap();

        assert_eq!(*gallery.commits.lock(), vec![1, 3]);
    }

    #[tokio::test]
    async fn denied_fails_before_any_commit() {
        let gallery = Arc::new(StubGallery::new(Authorization::Denied));
        let saver = SaveToGallery::new(gallery.clone());

        let err = saver.save_one(solid_image(1, 1)).await.unwrap_err();

        assert!(matches!(err, Error::PermissionDenied));
        assert!(gallery.commits.lock().is_empty());
        assert_eq!(*gallery.requests.lock(), 0);
    }

    #[tokio::test]
    async fn undetermined_asks_once() {
        let mut stub = StubGallery::new(Authorization::NotDetermined);
        stub.granted_on_request = true;
        let gallery = Arc::new(stub);
        let saver = SaveToGallery::new(gallery.clone());

        saver.save_all(&[solid_image(1, 1)]).await.unwrap();

        assert_eq!(*gallery.requests.lock(), 1);
        assert_eq!(*gallery.commits.lock(), vec![1]);
    }

    #[tokio::test]
    async fn commit_failures_become_save_failed() {
        let mut stub = StubGallery::new(Authorization::Granted);
        stub.fail_commit = true;
        let saver = SaveToGallery::new(Arc::new(stub));

        let err = saver.save_one(solid_image(1, 1)).await.unwrap_err();
        assert!(matches!(err, Error::SaveFailed(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn directory_gallery_writes_pngs_after_creating_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("gallery");
        let gallery = DirectoryGallery::new(dir.clone());
        assert_eq!(gallery.authorization_status(), Authorization::NotDetermined);

        let saver = SaveToGallery::new(Arc::new(gallery));
        saver.save_all(&[solid_image(2, 2), solid_image(3, 3)]).await.unwrap();

        let mut names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("sprite-") && n.ends_with(".png")));
        let saved = image::open(dir.join(&names[0])).unwrap();
        assert!(saved.width() == 2 || saved.width() == 3);
    }

    #[test]
    fn directory_gallery_denies_when_path_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(DirectoryGallery::new(file).authorization_status(), Authorization::Denied);
    }

    #[tokio::test]
    async fn failed_write_rolls_back_the_whole_batch() {
        let root = tempfile::tempdir().unwrap();
        let blocked = root.path().join("sprite-blocked.png");
        std::fs::create_dir(&blocked).unwrap();
        let files = vec![
            (root.path().join("sprite-first.png"), vec![1, 2, 3]),
            (blocked.clone(), vec![4, 5, 6]),
            (root.path().join("sprite-last.png"), vec![7, 8, 9]),
        ];

        let err = write_batch(files).await.unwrap_err();

        assert!(matches!(err, Error::SaveFailed(_)), "got {err:?}");
        let left: Vec<_> = std::fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(left, vec![blocked]);
    }
}
