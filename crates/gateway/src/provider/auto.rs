use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use config::RouteTarget;
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    error::{GatewayError, GatewayResult},
    prompts::PromptRegistry,
    provider::{ChatProvider, ChatStream, route_for_request},
    schemas::{ChatCompletionRequest, ChatMessage},
};

/// A meta-provider that selects the backend and model from the request's
/// prompt metadata and delegates to the chosen driver.
pub(crate) struct AutoRouter {
    routing: BTreeMap<String, RouteTarget>,
    prompts: Arc<PromptRegistry>,
    providers: IndexMap<String, Arc<dyn ChatProvider>>,
}

impl AutoRouter {
    pub fn new(
        routing: BTreeMap<String, RouteTarget>,
        prompts: Arc<PromptRegistry>,
        providers: IndexMap<String, Arc<dyn ChatProvider>>,
    ) -> Self {
        Self {
            routing,
            prompts,
            providers,
        }
    }

    fn select(&self, request: &ChatCompletionRequest) -> GatewayResult<(ChatCompletionRequest, Arc<dyn ChatProvider>)> {
        let target = route_for_request(&self.routing, &self.prompts, request)?;

        let provider = self
            .providers
            .get(&target.provider)
            .cloned()
            .ok_or_else(|| GatewayError::ProviderNotFound(target.provider.clone()))?;

        log::info!(
            "Auto-router selected model: prompt={:?} provider={} model={}",
            request.prompt_type,
            target.provider,
            target.model
        );

        let mut routed = request.clone();
        routed.model = Some(target.model.clone());

        Ok((routed, provider))
    }
}

#[async_trait]
impl ChatProvider for AutoRouter {
    async fn chat(&self, messages: &[ChatMessage], request: &ChatCompletionRequest) -> GatewayResult<Value> {
        let (routed, provider) = self.select(request)?;

        provider.chat(messages, &routed).await
    }

    async fn chat_stream(
        &self,
        messages: Vec<ChatMessage>,
        request: &ChatCompletionRequest,
    ) -> GatewayResult<(String, ChatStream)> {
        let (routed, provider) = self.select(request)?;

        provider.chat_stream(messages, &routed).await
    }

    fn name(&self) -> &str {
        "auto"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl ChatProvider for EchoProvider {
        async fn chat(&self, _messages: &[ChatMessage], request: &ChatCompletionRequest) -> GatewayResult<Value> {
            Ok(serde_json::json!({ "model": request.model }))
        }

        async fn chat_stream(
            &self,
            _messages: Vec<ChatMessage>,
            _request: &ChatCompletionRequest,
        ) -> GatewayResult<(String, ChatStream)> {
            Err(GatewayError::InternalError(None))
        }

        fn name(&self) -> &str {
            "openai"
        }
    }

    fn prompts() -> Arc<PromptRegistry> {
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("podcast_segment.yml"),
            indoc::indoc! {r#"
                id: podcast_segment
                version: v1
                meta:
                  complexity: synthesis
                template: "{{ segment }}"
            "#},
        )
        .unwrap();

        std::fs::write(
            dir.path().join("untagged.yml"),
            "id: untagged\nversion: v1\ntemplate: \"hello\"\n",
        )
        .unwrap();

        Arc::new(PromptRegistry::load(dir.path()).unwrap())
    }

    fn router() -> AutoRouter {
        let mut routing = BTreeMap::new();
        routing.insert(
            "default".to_string(),
            RouteTarget {
                provider: "openai".to_string(),
                model: "z-ai/glm-4.5-air:free".to_string(),
            },
        );
        routing.insert(
            "synthesis".to_string(),
            RouteTarget {
                provider: "openai".to_string(),
                model: "x-ai/grok-4-fast".to_string(),
            },
        );

        let mut providers: IndexMap<String, Arc<dyn ChatProvider>> = IndexMap::new();
        providers.insert("openai".to_string(), Arc::new(EchoProvider));

        AutoRouter::new(routing, prompts(), providers)
    }

    #[tokio::test]
    async fn routes_by_prompt_complexity() {
        let router = router();

        let request = ChatCompletionRequest {
            prompt_type: Some("podcast_segment".to_string()),
            ..Default::default()
        };

        let response = router.chat(&[ChatMessage::user("hi")], &request).await.unwrap();
        assert_eq!(response["model"], "x-ai/grok-4-fast");
    }

    #[tokio::test]
    async fn falls_back_to_default_for_untagged_prompts() {
        let router = router();

        let request = ChatCompletionRequest {
            prompt_type: Some("untagged".to_string()),
            ..Default::default()
        };

        let response = router.chat(&[ChatMessage::user("hi")], &request).await.unwrap();
        assert_eq!(response["model"], "z-ai/glm-4.5-air:free");
    }

    #[tokio::test]
    async fn falls_back_to_default_for_unknown_prompts() {
        let router = router();

        let request = ChatCompletionRequest {
            prompt_type: Some("missing".to_string()),
            ..Default::default()
        };

        let response = router.chat(&[ChatMessage::user("hi")], &request).await.unwrap();
        assert_eq!(response["model"], "z-ai/glm-4.5-air:free");
    }

    #[tokio::test]
    async fn falls_back_to_default_without_a_prompt_type() {
        let router = router();

        let response = router
            .chat(&[ChatMessage::user("hi")], &ChatCompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(response["model"], "z-ai/glm-4.5-air:free");
    }
}
