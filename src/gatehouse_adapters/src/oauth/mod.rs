mod google;
mod linkedin;

pub use google::GoogleProvider;
pub use linkedin::LinkedinProvider;

use serde::{Deserialize, Deserializer};

/// Shape of every token endpoint response we consume.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

/// Some providers report `email_verified` as a boolean, others as the
/// strings `"true"`/`"false"`.
pub(crate) fn opt_bool_from_bool_or_string<'de, D>(
    deserializer: D,
) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    Ok(
        Option::<BoolOrString>::deserialize(deserializer)?.map(|value| match value {
            BoolOrString::Bool(value) => value,
            BoolOrString::String(value) => value == "true",
        }),
    )
}
