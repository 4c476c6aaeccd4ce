use std::borrow::Cow;

use base64::{
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
	Engine as _,
};
use lol_html::{element, errors::RewritingError, rewrite_str, RewriteStrSettings};
use sha2::{Digest, Sha256};

const DATA_IMAGE_PREFIX: &str = "data:image/";

/// Editors are inconsistent about padding, so accept it either way.
const BASE64: GeneralPurpose = GeneralPurpose::new(
	&alphabet::STANDARD,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A decoded image ready to be written to the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
	/// `<sha256 of bytes>.<extension>`
	pub name: String,
	pub bytes: Vec<u8>,
}

/// The result of [`extract_images`].
#[derive(Debug)]
pub struct Extracted<'a> {
	pub html: Cow<'a, str>,
	/// Unique images referenced by `html`, in document order.
	pub images: Vec<Image>,
}

/// Why an embedded image was dropped instead of stored.
#[derive(Debug, thiserror::Error)]
pub enum Rejected {
	#[error("unsupported image type image/{0}")]
	UnsupportedType(String),
	#[error("malformed base64 payload: {0}")]
	Malformed(#[from] base64::DecodeError),
	#[error("empty payload")]
	Empty,
}

/// An embedded `data:image/<subtype>;base64,<payload>` URI.
#[derive(Debug, PartialEq, Eq)]
struct DataImage<'a> {
	subtype: &'a str,
	payload: &'a str,
}

impl<'a> DataImage<'a> {
	/// Parses a `src` value, returning `None` if it is not a base64 image data URI.
	fn parse(src: &'a str) -> Option<Self> {
		let src = src.trim();
		let rest = src
			.get(..DATA_IMAGE_PREFIX.len())
			.filter(|prefix| prefix.eq_ignore_ascii_case(DATA_IMAGE_PREFIX))
			.map(|_| &src[DATA_IMAGE_PREFIX.len()..])?;

		let (media, payload) = rest.split_once(',')?;
		let mut params = media.split(';');
		let subtype = params.next()?.trim();

		if subtype.is_empty() || !params.any(|param| param.trim().eq_ignore_ascii_case("base64")) {
			return None;
		}

		Some(Self { subtype, payload })
	}

	fn extension(&self) -> Option<&'static str> {
		Some(match self.subtype.to_ascii_lowercase().as_str() {
			"png" => "png",
			"jpeg" | "jpg" | "pjpeg" => "jpg",
			"gif" => "gif",
			"webp" => "webp",
			"bmp" => "bmp",
			"avif" => "avif",
			_ => return None,
		})
	}

	fn decode(&self) -> Result<Image, Rejected> {
		let extension = self
			.extension()
			.ok_or_else(|| Rejected::UnsupportedType(self.subtype.to_owned()))?;

		let payload = self
			.payload
			.bytes()
			.filter(|byte| !byte.is_ascii_whitespace())
			.collect::<Vec<_>>();

		let bytes = BASE64.decode(payload)?;

		if bytes.is_empty() {
			return Err(Rejected::Empty);
		}

		let name = format!("{}.{extension}", hex::encode(Sha256::digest(&bytes)));

		Ok(Image { name, bytes })
	}
}

/// Finds every element whose `src` is a base64 image data URI, decodes the image
/// and points the attribute at `<public_path>/<name>` instead.
///
/// Images that cannot be stored (unknown type, bad payload) lose their `src`
/// attribute. If nothing matched, the input is returned as-is.
pub fn extract_images<'a>(
	html: &'a str,
	public_path: &str,
) -> Result<Extracted<'a>, RewritingError> {
	let mut images: Vec<Image> = Vec::new();
	let mut changed = false;

	let output = rewrite_str(
		html,
		RewriteStrSettings {
			element_content_handlers: vec![element!("[src]", |el| {
				let Some(src) = el.get_attribute("src") else {
					return Ok(());
				};

				let Some(data) = DataImage::parse(&src) else {
					return Ok(());
				};

				changed = true;

				match data.decode() {
					Ok(image) => {
						el.set_attribute("src", &format!("{public_path}/{}", image.name))?;

						if !images.iter().any(|seen| seen.name == image.name) {
							images.push(image);
						}
					}
					Err(reason) => {
						tracing::warn!(%reason, tag = %el.tag_name(), "dropping embedded image");
						el.remove_attribute("src");
					}
				}

				Ok(())
			})],
			strict: false,
			..RewriteStrSettings::default()
		},
	)?;

	let html = if changed {
		Cow::Owned(output)
	} else {
		Cow::Borrowed(html)
	};

	Ok(Extracted { html, images })
}

#[cfg(test)]
mod test {
	use super::*;

	// 1x1 transparent png
	const PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

	fn decode(payload: &str) -> Vec<u8> {
		base64::engine::general_purpose::STANDARD
			.decode(payload)
			.unwrap()
	}

	#[test]
	fn test_parse_data_uri() {
		assert_eq!(
			DataImage::parse("data:image/png;base64,AAAA"),
			Some(DataImage {
				subtype: "png",
				payload: "AAAA"
			})
		);

		assert_eq!(
			DataImage::parse(" DATA:Image/JPEG;charset=utf-8;BASE64,AAAA"),
			Some(DataImage {
				subtype: "JPEG",
				payload: "AAAA"
			})
		);

		assert_eq!(DataImage::parse("data:text/html;base64,AAAA"), None);
		assert_eq!(DataImage::parse("data:image/svg+xml,<svg/>"), None);
		assert_eq!(DataImage::parse("/uploads/a.png"), None);
		assert_eq!(DataImage::parse("data:image/;base64,AAAA"), None);
		assert_eq!(DataImage::parse("dat"), None);
	}

	#[test]
	fn test_no_images_is_unchanged() {
		let inputs = [
			"",
			"plain text",
			"<p>hello <b>world</b></p>",
			r#"<p><img src="/uploads/a.png"><a href="data:text/plain;base64,AAAA">x</a></p>"#,
			r#"<img src="data:text/html;base64,PHA+aGk8L3A+">"#,
			"<p>unclosed <i>tags <img src='data:image/png;base64'",
		];

		for input in inputs {
			let extracted = extract_images(input, "/uploads").unwrap();

			assert!(matches!(extracted.html, Cow::Borrowed(html) if html == input));
			assert!(extracted.images.is_empty());
		}
	}

	#[test]
	fn test_single_image() {
		let html = format!(r#"<p>before<img src="data:image/png;base64,{PNG}" width="20">after</p>"#);
		let extracted = extract_images(&html, "/uploads").unwrap();

		assert_eq!(extracted.images.len(), 1);

		let image = &extracted.images[0];

		assert_eq!(image.bytes, decode(PNG));
		assert!(image.name.ends_with(".png"));
		assert_eq!(image.name.len(), 64 + ".png".len());
		assert!(!extracted.html.contains(PNG));
		assert!(!extracted.html.contains("data:"));
		assert_eq!(
			extracted.html,
			format!(r#"<p>before<img src="/uploads/{}" width="20">after</p>"#, image.name)
		);
	}

	#[test]
	fn test_distinct_images_get_distinct_names() {
		let payloads = ["AQID", "BAUG", "BwgJ"];
		let html = payloads
			.iter()
			.map(|payload| format!(r#"<img src="data:image/gif;base64,{payload}">"#))
			.collect::<String>();

		let extracted = extract_images(&html, "/static").unwrap();

		assert_eq!(extracted.images.len(), payloads.len());

		for (image, payload) in extracted.images.iter().zip(payloads) {
			assert_eq!(image.bytes, decode(payload));
			assert_eq!(
				extracted
					.html
					.matches(&format!("/static/{}", image.name))
					.count(),
				1
			);
		}
	}

	#[test]
	fn test_duplicate_images_share_a_file() {
		let html = format!(
			r#"<img src="data:image/png;base64,{PNG}"><img src="data:image/png;base64,{PNG}">"#
		);
		let extracted = extract_images(&html, "/uploads").unwrap();

		assert_eq!(extracted.images.len(), 1);
		assert_eq!(extracted.html.matches(&extracted.images[0].name).count(), 2);
	}

	#[test]
	fn test_rejected_images_lose_src() {
		let html = concat!(
			r#"<img src="data:image/png;base64,***" alt="bad">"#,
			r#"<img src="data:image/svg+xml;base64,PHN2Zy8+" alt="svg">"#,
			r#"<img src="data:image/png;base64," alt="empty">"#,
		);
		let extracted = extract_images(html, "/uploads").unwrap();

		assert!(extracted.images.is_empty());
		assert_eq!(
			extracted.html,
			r#"<img alt="bad"><img alt="svg"><img alt="empty">"#
		);
	}

	#[test]
	fn test_whitespace_and_missing_padding() {
		let extracted = extract_images(
			"<img src=\"data:image/jpeg;base64,AQ\nID\r\nBA\">",
			"/uploads",
		)
		.unwrap();

		assert_eq!(extracted.images[0].bytes, vec![1, 2, 3, 4]);
		assert!(extracted.images[0].name.ends_with(".jpg"));
	}

	#[test]
	fn test_only_src_attributes_match() {
		let html = format!(r#"<p title="src=&quot;data:image/png;base64,{PNG}&quot;">text</p>"#);
		let extracted = extract_images(&html, "/uploads").unwrap();

		assert!(extracted.images.is_empty());
		assert_eq!(extracted.html, html);
	}
}
