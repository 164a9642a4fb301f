use std::path::{Component, Path, PathBuf};

use image::ImageFormat;

/// Sub-directory of the uploads root that post images are written into.
pub const POST_IMAGE_DIR: &str = "posts";

/// Raster formats a post image may be stored as.
const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Gif,
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
];

/// Format of an upload, when its bytes are an accepted image and agree with
/// the extension of `filename`.
pub fn image_format(filename: &str, data: &[u8]) -> Option<ImageFormat> {
    let claimed = Path::new(filename)
        .extension()
        .and_then(ImageFormat::from_extension)?;
    let detected = image::guess_format(data).ok()?;

    (claimed == detected && ACCEPTED_FORMATS.contains(&detected)).then_some(detected)
}

pub fn is_image(filename: &str, data: &[u8]) -> bool {
    image_format(filename, data).is_some()
}

/// Write an uploaded image under `<uploads>/posts/` and return the path
/// relative to `uploads` that gets stored on the post. When the name is taken
/// a short random suffix is appended to the stem.
pub async fn save_post_image(uploads: &Path, filename: &str, data: &[u8]) -> std::io::Result<String> {
    let dir = uploads.join(POST_IMAGE_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let clean = sanitize_filename(filename);
    let mut name = clean.clone();
    while tokio::fs::try_exists(dir.join(&name)).await? {
        name = with_suffix(&clean);
    }

    tokio::fs::write(dir.join(&name), data).await?;
    tracing::info!("Stored upload {} ({} bytes)", name, data.len());
    Ok(format!("{}/{}", POST_IMAGE_DIR, name))
}

/// Remove a stored upload whose post never made it into the database.
pub async fn discard(uploads: &Path, relative: &str) {
    let Some(path) = resolve(uploads, relative) else {
        return;
    };
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
    }
}

/// Resolve a request path under the uploads root, refusing anything that
/// could step outside it.
pub fn resolve(uploads: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(uploads.join(relative))
}

/// Last path component with anything but ASCII alphanumerics, `.`, `-` and
/// `_` replaced.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn with_suffix(name: &str) -> String {
    let suffix = &hex::encode(rand::random::<[u8; 4]>())[..7];
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    }
}
