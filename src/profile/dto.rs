use serde::{de::IgnoredAny, Deserialize, Serialize};

use super::patch::Patch;
use crate::images::services::ImageUpload;

/// Writable profile fields. `email` is not one of them.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Patch<String>,
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
    pub profile_image: Patch<ImageUpload>,
}

impl ProfileUpdate {
    pub(crate) fn text_field_mut(&mut self, name: &str) -> Option<&mut Patch<String>> {
        match name {
            "username" => Some(&mut self.username),
            "first_name" => Some(&mut self.first_name),
            "last_name" => Some(&mut self.last_name),
            _ => None,
        }
    }
}

/// JSON form of a profile update. Unknown keys, `email` included, are
/// dropped by serde.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JsonProfileBody {
    pub username: Patch<String>,
    pub first_name: Patch<String>,
    pub last_name: Patch<String>,
    /// JSON cannot carry a file, so only `null` means anything here.
    pub profile_image: Patch<IgnoredAny>,
}

impl From<JsonProfileBody> for ProfileUpdate {
    fn from(b: JsonProfileBody) -> Self {
        Self {
            username: b.username,
            first_name: b.first_name,
            last_name: b.last_name,
            profile_image: match b.profile_image {
                Patch::Null => Patch::Null,
                Patch::Set(_) | Patch::Unset => Patch::Unset,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Time-limited download URL of the image, if one is set.
    pub profile_image: Option<String>,
}
