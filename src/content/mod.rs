//! The content store: images extracted from rich-text submissions, written to
//! a directory that is served back under a public path.

mod extract;

use std::{
	io,
	path::{Path, PathBuf},
};

use tokio::fs;
use uuid::Uuid;

pub use extract::{extract_images, Extracted, Image};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("could not parse content: {0}")]
	Rewrite(#[from] lol_html::errors::RewritingError),
	#[error("could not store image: {0}")]
	Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct ContentStore {
	dir: PathBuf,
	public_path: String,
}

impl ContentStore {
	/// Opens the store, creating its directory if needed.
	pub async fn open(dir: impl Into<PathBuf>, public_path: impl Into<String>) -> io::Result<Self> {
		let dir = dir.into();

		fs::create_dir_all(&dir).await?;

		Ok(Self {
			dir,
			public_path: public_path.into(),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Replaces embedded base64 images in `html` with references to stored files.
	///
	/// Every referenced file is written before this returns, so the caller can
	/// persist the returned markup knowing its images exist.
	pub async fn sanitize(&self, html: &str) -> Result<String, Error> {
		let Extracted { html, images } = extract_images(html, &self.public_path)?;

		for image in &images {
			self.write(image).await?;
		}

		if !images.is_empty() {
			tracing::info!(
				monotonic_counter.images_stored = images.len() as u64,
				"stored embedded images"
			);
		}

		Ok(html.into_owned())
	}

	/// Writes an image through a temporary file, so a reader never sees a
	/// partial file under the final name.
	async fn write(&self, image: &Image) -> io::Result<()> {
		let path = self.dir.join(&image.name);

		// Names are content hashes, so an existing file already has these bytes.
		if fs::try_exists(&path).await? {
			return Ok(());
		}

		let temp = self
			.dir
			.join(format!(".{}.{}.tmp", image.name, Uuid::new_v4()));

		fs::write(&temp, &image.bytes).await?;

		if let Err(error) = fs::rename(&temp, &path).await {
			fs::remove_file(&temp).await.ok();
			return Err(error);
		}

		tracing::debug!(name = %image.name, size = image.bytes.len(), "stored image");

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use base64::{engine::general_purpose::STANDARD, Engine as _};

	use super::*;

	async fn store() -> (tempfile::TempDir, ContentStore) {
		let dir = tempfile::tempdir().unwrap();
		let store = ContentStore::open(dir.path().join("uploads"), "/uploads")
			.await
			.unwrap();

		(dir, store)
	}

	#[tokio::test]
	async fn test_sanitize_without_images() {
		let (_dir, store) = store().await;
		let html = "<p>nothing to see</p>";

		assert_eq!(store.sanitize(html).await.unwrap(), html);
		assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 0);
	}

	#[tokio::test]
	async fn test_sanitize_writes_referenced_files() {
		let (_dir, store) = store().await;
		let images: [&[u8]; 2] = [b"first image", b"second image"];
		let html = images
			.iter()
			.map(|bytes| format!(r#"<img src="data:image/png;base64,{}">"#, STANDARD.encode(bytes)))
			.collect::<String>();

		let sanitized = store.sanitize(&html).await.unwrap();

		assert!(!sanitized.contains("base64"));

		let mut names = Vec::new();

		for reference in sanitized.split(r#"src="/uploads/"#).skip(1) {
			let name = reference.split('"').next().unwrap();
			names.push(name.to_owned());
		}

		assert_eq!(names.len(), images.len());

		for (name, bytes) in names.iter().zip(images) {
			assert_eq!(std::fs::read(store.dir().join(name)).unwrap(), bytes);
		}

		// no temporary files are left behind
		assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), images.len());
	}

	#[tokio::test]
	async fn test_sanitize_is_idempotent_for_stored_images() {
		let (_dir, store) = store().await;
		let html = format!(
			r#"<img src="data:image/webp;base64,{}">"#,
			STANDARD.encode(b"same bytes")
		);

		let first = store.sanitize(&html).await.unwrap();
		let second = store.sanitize(&html).await.unwrap();

		assert_eq!(first, second);
		assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
	}

	#[tokio::test]
	async fn test_write_failure_is_reported() {
		let (dir, store) = store().await;
		std::fs::remove_dir(store.dir()).unwrap();
		// a file where the directory should be
		std::fs::write(dir.path().join("uploads"), b"").unwrap();

		let html = format!(
			r#"<img src="data:image/png;base64,{}">"#,
			STANDARD.encode(b"bytes")
		);

		assert!(matches!(store.sanitize(&html).await, Err(Error::Io(..))));
	}
}
