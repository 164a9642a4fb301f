use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Form;
use bytes::Bytes;
use serde::Deserialize;

use crate::db::models::Group;
use crate::db::posts::PostFields;
use crate::error::AppError;
use crate::media;
use crate::state::AppState;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice.";
pub const INVALID_IMAGE: &str = "Upload a valid image.";

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Bytes,
}

/// Raw post submission, accepted as either urlencoded or multipart form data.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    /// Group id as submitted; empty means "no group".
    pub group: String,
    pub image: Option<UploadedImage>,
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Deserialize, Default)]
struct UrlencodedPostForm {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: String,
}

impl PostForm {
    /// Check the submission against the known groups. On success returns the
    /// fields to persist; the image path is filled in once the file is stored.
    pub fn validate(&self, groups: &[Group]) -> Result<PostFields, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.text = Some(REQUIRED.to_string());
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.group = Some(INVALID_CHOICE.to_string());
                    None
                }
            },
        };

        if let Some(image) = &self.image {
            if !media::is_image(&image.filename, &image.data) {
                errors.image = Some(INVALID_IMAGE.to_string());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(PostFields {
            text: text.to_string(),
            group_id,
            image: None,
        })
    }

    /// Selected group id, for re-rendering the picker.
    pub fn selected_group(&self) -> Option<i64> {
        self.group.trim().parse().ok()
    }
}

impl FromRequest<AppState> for PostForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(raw) = Form::<UrlencodedPostForm>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(PostForm {
                text: raw.text,
                group: raw.group,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "text" => form.text = field.text().await?,
                "group" => form.group = field.text().await?,
                "image" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await?;
                    // Browsers send an empty part when no file was chosen
                    if !filename.is_empty() {
                        form.image = Some(UploadedImage { filename, data });
                    }
                }
                other => tracing::debug!("Ignoring unexpected form field {:?}", other),
            }
        }

        Ok(form)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(FormErrors {
                text: Some(REQUIRED.to_string()),
                ..Default::default()
            });
        }
        Ok(text.to_string())
    }
}
