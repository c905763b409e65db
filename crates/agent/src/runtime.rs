use std::sync::{Mutex, MutexGuard};

use arthur_core::errors::{KnowledgeBaseError, SelectionError};
use arthur_core::selector::ResponseSelector;
use tracing::info;

use crate::conversation::{Conversation, ConversationError, MessageKind, Sender};

/// Routes chat turns through the response selector and keeps the transcript.
#[derive(Debug)]
pub struct ChatRuntime {
    selector: ResponseSelector,
    conversation: Mutex<Conversation>,
}

impl ChatRuntime {
    pub fn new(selector: ResponseSelector) -> Self {
        Self { selector, conversation: Mutex::new(Conversation::new()) }
    }

    pub fn selector(&self) -> &ResponseSelector {
        &self.selector
    }

    /// Records the user turn, selects a reply and records it.
    /// On a selection error only the user turn stays in the transcript.
    pub fn handle_message(&self, text: &str) -> Result<String, SelectionError> {
        let (session_id, message_id) = {
            let mut conversation = self.conversation();
            let message_id = conversation.add_message(Sender::User, text, MessageKind::Text);
            (conversation.session_id.clone(), message_id)
        };

        let selection = self.selector.select(text)?;
        info!(
            event_name = "agent.reply.selected",
            session_id = %session_id,
            message_id = %message_id,
            outcome = selection.outcome.as_str(),
            tag = selection.tag.as_deref().unwrap_or("none"),
            probability = selection.probability.unwrap_or_default(),
            "reply selected"
        );

        self.conversation().add_message(Sender::Bot, selection.reply.clone(), MessageKind::Text);
        Ok(selection.reply)
    }

    /// Re-reads the knowledge base; returns the number of intents now served.
    pub fn reload_knowledge(&self) -> Result<usize, KnowledgeBaseError> {
        let knowledge = self.selector.knowledge().reload()?;
        Ok(knowledge.len())
    }

    pub fn transcript(&self) -> Conversation {
        self.conversation().clone()
    }

    pub fn clear_conversation(&self) {
        self.conversation().clear();
    }

    pub fn export_conversation(&self) -> Result<String, ConversationError> {
        self.conversation().export_json()
    }

    pub fn import_conversation(&self, raw: &str) -> Result<(), ConversationError> {
        self.conversation().import_json(raw)
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        match self.conversation.lock() {
            Ok(conversation) => conversation,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arthur_core::errors::{ModelError, SelectionError};
    use arthur_core::knowledge::{SharedKnowledgeBase, StaticSource};
    use arthur_core::ml::{Classifier, Prediction};
    use arthur_core::nlp::FeatureExtractor;
    use arthur_core::selector::{ResponseSelector, SeededPicker, FALLBACK_MESSAGE};

    use super::ChatRuntime;
    use crate::conversation::Sender;

    struct LengthExtractor;

    impl FeatureExtractor for LengthExtractor {
        fn extract(&self, utterance: &str) -> Vec<f32> {
            vec![utterance.len() as f32]
        }
    }

    /// Confident about "greeting" for short utterances, unsure otherwise.
    struct LengthClassifier {
        tags: Vec<String>,
    }

    impl Classifier for LengthClassifier {
        fn tags(&self) -> &[String] {
            &self.tags
        }

        fn predict(&self, features: &[f32]) -> Result<Prediction, ModelError> {
            let confident = features.first().copied().unwrap_or_default() <= 3.0;
            let probability = if confident { 0.9 } else { 0.4 };
            Ok(Prediction::from_pairs([("greeting", probability), ("other", 1.0 - probability)]))
        }
    }

    fn runtime(source: &str) -> ChatRuntime {
        let selector = ResponseSelector::new(
            Arc::new(SharedKnowledgeBase::new(StaticSource::new(source))),
            Arc::new(LengthExtractor),
            Arc::new(LengthClassifier { tags: vec!["greeting".to_string(), "other".to_string()] }),
        )
        .with_picker(Arc::new(SeededPicker::new(3)));
        ChatRuntime::new(selector)
    }

    const SOURCE: &str =
        r#"{"intents":[{"tag":"greeting","patterns":["hi"],"responses":["Hello!"]}]}"#;

    #[test]
    fn each_turn_records_user_and_bot_messages() {
        let runtime = runtime(SOURCE);

        assert_eq!(runtime.handle_message("hi").expect("reply"), "Hello!");
        assert_eq!(runtime.handle_message("what is this").expect("reply"), FALLBACK_MESSAGE);

        let transcript = runtime.transcript();
        let senders: Vec<Sender> = transcript.messages().iter().map(|message| message.sender).collect();
        assert_eq!(senders, vec![Sender::User, Sender::Bot, Sender::User, Sender::Bot]);
        assert_eq!(transcript.messages()[3].content, FALLBACK_MESSAGE);
    }

    #[test]
    fn selection_error_keeps_only_user_turn() {
        let runtime = runtime("{ not json");

        let error = runtime.handle_message("hi").expect_err("knowledge load should fail");

        assert!(matches!(error, SelectionError::KnowledgeBase(_)));
        let transcript = runtime.transcript();
        assert_eq!(transcript.messages().len(), 1);
        assert_eq!(transcript.messages()[0].sender, Sender::User);
    }

    #[test]
    fn clear_conversation_resets_transcript() {
        let runtime = runtime(SOURCE);
        runtime.handle_message("hi").expect("reply");

        runtime.clear_conversation();

        assert!(runtime.transcript().messages().is_empty());
    }

    #[test]
    fn reload_knowledge_reports_intent_count() {
        let runtime = runtime(SOURCE);

        assert_eq!(runtime.reload_knowledge().expect("reload"), 1);
        assert_eq!(runtime.selector().knowledge().generation(), 1);
    }
}
