//! Bedrock model identifiers
//!
//! Identifiers look like `anthropic.claude-v2`, optionally behind a
//! cross-region inference prefix (`us.anthropic.claude-3-haiku-...`) or as
//! the last path segment of an ARN.

use super::vendors::Vendor;

const REGION_PREFIXES: &[&str] = &["us-gov.", "us.", "eu.", "apac."];

/// A model identifier split into vendor and model name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    /// Vendor segment
    pub vendor: Vendor,
    /// Everything after the vendor segment
    pub model: String,
}

impl ModelId {
    /// Split `"<vendor>.<model>"`; identifiers without a vendor segment yield `None`
    pub fn parse(model_id: &str) -> Option<Self> {
        let id = model_id.rsplit('/').next().unwrap_or(model_id).trim();
        let id = REGION_PREFIXES
            .iter()
            .find_map(|prefix| id.strip_prefix(prefix))
            .unwrap_or(id);

        let (vendor, model) = id.split_once('.')?;
        if vendor.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self {
            vendor: Vendor::from_name(vendor),
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        let id = ModelId::parse("cohere.command-text-v14").unwrap();
        assert_eq!(id.vendor, Vendor::Cohere);
        assert_eq!(id.model, "command-text-v14");
    }

    #[test]
    fn test_splits_on_first_dot_only() {
        let id = ModelId::parse("meta.llama2-13b-chat-v1.0").unwrap();
        assert_eq!(id.vendor, Vendor::Meta);
        assert_eq!(id.model, "llama2-13b-chat-v1.0");
    }

    #[test]
    fn test_cross_region_prefix() {
        let id = ModelId::parse("us.anthropic.claude-3-haiku-20240307-v1:0").unwrap();
        assert_eq!(id.vendor, Vendor::Anthropic);
        assert_eq!(id.model, "claude-3-haiku-20240307-v1:0");
    }

    #[test]
    fn test_arn() {
        let id = ModelId::parse(
            "arn:aws:bedrock:us-east-1::foundation-model/amazon.titan-text-express-v1",
        )
        .unwrap();
        assert_eq!(id.vendor, Vendor::Amazon);
        assert_eq!(id.model, "titan-text-express-v1");
    }

    #[test]
    fn test_unknown_vendor_kept() {
        let id = ModelId::parse("stability.stable-diffusion-xl").unwrap();
        assert_eq!(id.vendor, Vendor::Unknown("stability".to_string()));
    }

    #[test]
    fn test_no_vendor_segment() {
        assert_eq!(ModelId::parse("my-custom-model"), None);
        assert_eq!(ModelId::parse(".model"), None);
        assert_eq!(ModelId::parse(""), None);
    }
}
