//! On-demand page translation through a chat-completion provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProviderError, ServiceError, ServiceResult};
use crate::language::Language;
use crate::models::Page;
use crate::store::PageStore;

/// Trait implemented by concrete translation backends.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates Arabic source text into `target`.
    async fn translate(&self, text: &str, target: Language) -> Result<String, ProviderError>;

    /// Translates the Arabic text visible in the scanned page at `image_url`.
    async fn translate_image(
        &self,
        image_url: &str,
        target: Language,
    ) -> Result<String, ProviderError>;
}

/// A stored translation and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTranslation {
    /// Page after the translation was stored.
    pub page: Page,
    /// The translation text.
    pub translated_text: String,
    /// Whether the page image, not its text, was translated.
    pub used_image: bool,
}

const SYSTEM_PROMPT: &str = "You translate classical Arabic book pages. \
Translate only the text you are given and never complete or explain it. \
Keep every line break and blank line exactly where the source has them, \
including page numbers, hadith titles, chains of narration and references. \
Reply with the translation only.";

/// Translator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiTranslator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiTranslator {
    /// Builds a new chat client.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if model.trim().is_empty() {
            return Err(ProviderError::Input("missing translation model name".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::Input("invalid OpenAI API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            temperature,
        })
    }
}

impl OpenAiTranslator {
    async fn complete(&self, content: MessageContent<'_>) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
        };
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status { status, body });
        }
        let parsed: ChatResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .map(|choice| choice.message.content.trim().to_string())
            .find(|content| !content.is_empty())
            .ok_or(ProviderError::Empty("translation"))
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, ProviderError> {
        let prompt = format!(
            "Translate the following Arabic text to {}.\n\nArabic text:\n{}\n\n{} translation:",
            target.name(),
            text,
            target.name()
        );
        self.complete(MessageContent::Text(&prompt)).await
    }

    async fn translate_image(
        &self,
        image_url: &str,
        target: Language,
    ) -> Result<String, ProviderError> {
        let prompt = format!(
            "Translate all Arabic text visible in this page image to {}. \
            Translate only what is legible; do not complete text cut off at the edges.",
            target.name()
        );
        self.complete(MessageContent::Parts(vec![
            ContentPart::Text { text: &prompt },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url: image_url },
            },
        ]))
        .await
    }
}

/// Translates a page into `target` and stores the result on the page.
///
/// With `use_image` the scanned page is translated when it has an image;
/// pages without one fall back to their text.
pub async fn translate_page(
    store: &dyn PageStore,
    translator: &dyn Translator,
    page_id: i64,
    target: Language,
    use_image: bool,
) -> ServiceResult<PageTranslation> {
    if !matches!(target, Language::English | Language::Indonesian) {
        return Err(ServiceError::invalid(format!(
            "target_language must be \"en\" or \"id\", got {target:?}"
        )));
    }
    let page = store
        .page(page_id)
        .await?
        .ok_or(ServiceError::PageNotFound(page_id))?;
    let image_url = page.page_image_url.as_deref().filter(|_| use_image);
    let translated = match image_url {
        Some(url) => translator.translate_image(url, target).await?,
        None => {
            if page.original_text.trim().is_empty() {
                return Err(ServiceError::invalid(format!(
                    "page {page_id} has no text to translate"
                )));
            }
            translator.translate(&page.original_text, target).await?
        }
    };
    let used_image = image_url.is_some();
    store
        .store_translation(page_id, target, &translated)
        .await?;
    info!(
        page_id,
        language = %target,
        used_image,
        chars = translated.chars().count(),
        "stored translation"
    );
    let page = store
        .page(page_id)
        .await?
        .ok_or(ServiceError::PageNotFound(page_id))?;
    Ok(PageTranslation {
        page,
        translated_text: translated,
        used_image,
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct Echo;

    #[async_trait]
    impl Translator for Echo {
        async fn translate(&self, text: &str, target: Language) -> Result<String, ProviderError> {
            Ok(format!("[{target}] {text}"))
        }

        async fn translate_image(
            &self,
            image_url: &str,
            target: Language,
        ) -> Result<String, ProviderError> {
            Ok(format!("[{target}] image {image_url}"))
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn translation_is_stored_on_the_page() {
        let store = MemoryStore::new(2);
        let book = store.insert_book("Arbain", None).await;
        let page = store.insert_page(book.id, 1, "إنما الأعمال بالنيات").await.unwrap();

        let translation = translate_page(&store, &Echo, page.id, Language::English, false)
            .await
            .expect("translated");
        assert!(!translation.used_image);
        assert_eq!(translation.translated_text, "[en] إنما الأعمال بالنيات");
        assert_eq!(
            translation.page.en_translation.as_deref(),
            Some("[en] إنما الأعمال بالنيات")
        );
        assert!(translation.page.id_translation.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn image_translation_falls_back_to_text_without_an_image() {
        let store = MemoryStore::new(2);
        let book = store.insert_book("Arbain", None).await;
        let scanned = store.insert_page(book.id, 1, "الدين النصيحة").await.unwrap();
        let plain = store.insert_page(book.id, 2, "لا ضرر ولا ضرار").await.unwrap();
        store
            .set_page_image_url(scanned.id, "https://cdn.example/arbain/1.png")
            .await
            .unwrap();

        let from_image = translate_page(&store, &Echo, scanned.id, Language::Indonesian, true)
            .await
            .expect("translated from image");
        assert!(from_image.used_image);
        assert_eq!(
            from_image.page.id_translation.as_deref(),
            Some("[id] image https://cdn.example/arbain/1.png")
        );

        let from_text = translate_page(&store, &Echo, plain.id, Language::Indonesian, true)
            .await
            .expect("translated from text");
        assert!(!from_text.used_image);
        assert_eq!(from_text.translated_text, "[id] لا ضرر ولا ضرار");

        let text_requested = translate_page(&store, &Echo, scanned.id, Language::English, false)
            .await
            .expect("translated from text");
        assert!(!text_requested.used_image);
        assert_eq!(text_requested.translated_text, "[en] الدين النصيحة");
    }

    #[test]
    fn image_messages_serialize_as_content_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "translate" },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "https://cdn.example/p.png",
                },
            },
        ]);
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            serde_json::json!([
                {"type": "text", "text": "translate"},
                {"type": "image_url", "image_url": {"url": "https://cdn.example/p.png"}}
            ])
        );
        assert_eq!(
            serde_json::to_value(MessageContent::Text("plain")).unwrap(),
            serde_json::json!("plain")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn rejects_unsupported_targets_and_unknown_pages() {
        let store = MemoryStore::new(2);
        let err = translate_page(&store, &Echo, 1, Language::Arabic, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        let err = translate_page(&store, &Echo, 42, Language::Indonesian, false)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PageNotFound(42)));
    }
}
