use crate::chunking::{chunk_pages, normalize_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::generation::Generator;
use crate::index::build_index;
use crate::ingest::LoadedDocument;
use crate::prompts::{answer_prompt, clean_qa_output, content_prompt, sample_text};
use crate::retriever::retrieve;
use crate::session::{DocumentSession, SessionStore};
use crate::{
    Answer, Chunk, DocumentId, DocumentMetadata, GenerationMode, Health, IngestOutcome, RagError,
    RagOptions, SessionError,
};
use tracing::{debug, info, warn};

/// Ingests documents and answers questions about them.
///
/// Owns the embedding and generation capabilities for its whole lifetime, so
/// every index is built and queried with the same embedder.
pub struct QaCoordinator<E, G>
where
    E: Embedder,
    G: Generator,
{
    embedder: E,
    generator: G,
    store: SessionStore,
    options: RagOptions,
}

impl<E, G> QaCoordinator<E, G>
where
    E: Embedder + Send + Sync,
    G: Generator + Send + Sync,
{
    pub fn new(embedder: E, generator: G) -> Self {
        Self::with_options(embedder, generator, SessionStore::default(), RagOptions::default())
    }

    pub fn with_options(embedder: E, generator: G, store: SessionStore, options: RagOptions) -> Self {
        Self {
            embedder,
            generator,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Indexes `pages`, generates the mode's content and registers a session.
    ///
    /// Nothing is stored unless every step succeeds.
    pub fn ingest<S: AsRef<str>>(
        &self,
        pages: &[S],
        mode: GenerationMode,
    ) -> Result<IngestOutcome, RagError> {
        self.ingest_with_metadata(pages, mode, DocumentMetadata::now())
    }

    pub fn ingest_document(
        &self,
        document: LoadedDocument,
        mode: GenerationMode,
    ) -> Result<IngestOutcome, RagError> {
        let metadata = DocumentMetadata {
            title: Some(document.title),
            checksum: Some(document.checksum),
            ..DocumentMetadata::now()
        };
        self.ingest_with_metadata(&document.pages, mode, metadata)
    }

    fn ingest_with_metadata<S: AsRef<str>>(
        &self,
        pages: &[S],
        mode: GenerationMode,
        metadata: DocumentMetadata,
    ) -> Result<IngestOutcome, RagError> {
        let pages: Vec<String> = pages.iter().map(|page| normalize_text(page.as_ref())).collect();
        let chunks = chunk_pages(&pages, ChunkingConfig::from(&self.options))?;
        let (index, _) = build_index(&self.embedder, &chunks)?;
        let generated_content = self.generate_content(&chunks, mode)?;

        let document_id = DocumentId::new();
        let outcome = IngestOutcome {
            document_id,
            message: format!(
                "PDF loaded and indexed successfully! Generated {} content.",
                mode.as_str().to_uppercase()
            ),
            generated_content,
            page_count: pages.len(),
            chunk_count: chunks.len(),
        };

        self.store.insert(DocumentSession {
            id: document_id,
            index,
            chunks,
            pages,
            mode,
            metadata,
        });

        info!(
            document_id = %document_id,
            mode = %mode,
            pages = outcome.page_count,
            chunks = outcome.chunk_count,
            "document ingested"
        );
        Ok(outcome)
    }

    /// Produces Q/A pairs or MCQs from the opening chunks of a document.
    pub fn generate_content(&self, chunks: &[Chunk], mode: GenerationMode) -> Result<String, RagError> {
        let sample = sample_text(chunks, self.options.sample_chunks, self.options.max_sample_chars);
        let prompt = content_prompt(mode, &sample);
        debug!(mode = %mode, sample_chars = sample.chars().count(), "generating content");

        let raw = self.generator.generate(&prompt, self.options.content_params)?;
        Ok(match mode {
            GenerationMode::Qa => clean_qa_output(&raw),
            GenerationMode::Mcq => raw.trim().to_string(),
        })
    }

    /// Answers `question` using only passages retrieved from the given document.
    pub fn ask(&self, document_id: &DocumentId, question: &str) -> Result<Answer, SessionError> {
        self.ask_with_k(document_id, question, self.options.top_k)
    }

    pub fn ask_with_k(
        &self,
        document_id: &DocumentId,
        question: &str,
        k: usize,
    ) -> Result<Answer, SessionError> {
        let session = self
            .store
            .get(document_id)
            .ok_or(SessionError::NotFound(*document_id))?;

        if question.trim().is_empty() {
            return Err(RagError::EmptyQuestion.into());
        }

        let mut sources = retrieve(&self.embedder, question, &session.index, &session.chunks, k)?;
        if let Some(min_score) = self.options.min_score {
            let before = sources.len();
            sources.retain(|retrieval| retrieval.score >= min_score);
            if sources.len() < before {
                debug!(dropped = before - sources.len(), min_score, "filtered weak retrievals");
            }
        }
        if sources.is_empty() {
            warn!(document_id = %document_id, "no passages cleared the score threshold");
        }

        let prompt = answer_prompt(question, &sources);
        let text = self.generator.generate(&prompt, self.options.answer_params)?;

        Ok(Answer { text, sources })
    }

    pub fn health(&self) -> Health {
        Health {
            models_loaded: true,
            sessions: self.store.len(),
            embedding_dimensions: self.embedder.dimensions(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::GenerationParams;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// Records prompts and replies with a canned response.
    #[derive(Default)]
    struct ScriptedGenerator {
        reply: String,
        fail: AtomicBool,
        prompts: Mutex<Vec<(String, GenerationParams)>>,
    }

    impl ScriptedGenerator {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: AtomicBool::new(true),
                ..Self::default()
            }
        }
    }

    impl Generator for Arc<ScriptedGenerator> {
        fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String, RagError> {
            self.prompts.lock().push((prompt.to_string(), params));
            if self.fail.load(Ordering::SeqCst) {
                return Err(RagError::Generation("model overloaded".to_string()));
            }
            Ok(self.reply.clone())
        }
    }

    fn pages() -> Vec<String> {
        vec![
            "The hydraulic pump raises pressure in the main circuit.".to_string(),
            "  Lubricate the bearings\r\nevery five hundred hours. ".to_string(),
            String::new(),
            "The relief valve protects the hydraulic circuit from overpressure.".to_string(),
        ]
    }

    fn coordinator(
        generator: &Arc<ScriptedGenerator>,
    ) -> QaCoordinator<CharacterNgramEmbedder, Arc<ScriptedGenerator>> {
        QaCoordinator::new(CharacterNgramEmbedder::default(), Arc::clone(generator))
    }

    #[test]
    fn qa_ingestion_cleans_output_and_registers_session() {
        let generator = Arc::new(ScriptedGenerator::replying(
            "Here you go!\nQ1: What raises pressure?\nA1: The pump.\n",
        ));
        let qa = coordinator(&generator);

        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();

        assert_eq!(outcome.generated_content, "Q1: What raises pressure?\nA1: The pump.");
        assert_eq!(
            outcome.message,
            "PDF loaded and indexed successfully! Generated QA content."
        );
        assert_eq!(outcome.page_count, 4);
        assert_eq!(outcome.chunk_count, 3);
        assert!(qa.store().contains(&outcome.document_id));

        let prompts = generator.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("10 question and answer pairs"));
        assert!(prompts[0].0.contains("Lubricate the bearings every five hundred hours."));
        assert_eq!(prompts[0].1, GenerationParams::CONTENT);
    }

    #[test]
    fn mcq_output_is_only_trimmed() {
        let generator = Arc::new(ScriptedGenerator::replying("  Q1: Pick one\nA) x\nB) y\n\nnote "));
        let qa = coordinator(&generator);

        let outcome = qa.ingest(&pages(), GenerationMode::Mcq).unwrap();
        assert_eq!(outcome.generated_content, "Q1: Pick one\nA) x\nB) y\n\nnote");
        assert!(outcome.message.ends_with("Generated MCQ content."));
        assert!(generator.prompts.lock()[0].0.contains("multiple choice questions"));
    }

    #[test]
    fn content_sample_is_truncated() {
        let generator = Arc::new(ScriptedGenerator::replying("ok"));
        let options = RagOptions {
            max_sample_chars: 12,
            ..RagOptions::default()
        };
        let qa = QaCoordinator::with_options(
            CharacterNgramEmbedder::default(),
            Arc::clone(&generator),
            SessionStore::default(),
            options,
        );

        qa.ingest(&pages(), GenerationMode::Qa).unwrap();
        let prompt = generator.prompts.lock()[0].0.clone();
        assert!(prompt.contains("Text:\nThe hydrauli\n\nRespond ONLY"));
    }

    #[test]
    fn empty_document_creates_no_session() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let qa = coordinator(&generator);

        let result = qa.ingest(&["", "   "], GenerationMode::Qa);
        assert!(matches!(result, Err(RagError::EmptyDocument)));
        assert!(qa.store().is_empty());
        assert!(generator.prompts.lock().is_empty());
    }

    #[test]
    fn generation_failure_creates_no_session() {
        let generator = Arc::new(ScriptedGenerator::failing());
        let qa = coordinator(&generator);

        let error = qa.ingest(&pages(), GenerationMode::Qa).unwrap_err();
        assert!(error.is_retryable());
        assert!(qa.store().is_empty());
    }

    #[test]
    fn ask_grounds_answer_in_retrieved_pages() {
        let generator = Arc::new(ScriptedGenerator::replying("The relief valve."));
        let qa = coordinator(&generator);
        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();

        let answer = qa
            .ask(&outcome.document_id, "What protects the hydraulic circuit?")
            .unwrap();

        assert_eq!(answer.text, "The relief valve.");
        assert_eq!(answer.sources.len(), 3);
        assert!(answer
            .sources
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));

        let prompts = generator.prompts.lock();
        let (prompt, params) = prompts.last().unwrap();
        assert!(prompt.contains("[p4] The relief valve protects"));
        assert!(prompt.contains("Question: What protects the hydraulic circuit?"));
        assert_eq!(*params, GenerationParams::ANSWER);
    }

    #[test]
    fn unknown_document_is_not_found() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let qa = coordinator(&generator);

        let missing = DocumentId::new();
        assert!(matches!(
            qa.ask(&missing, "anything?"),
            Err(SessionError::NotFound(id)) if id == missing
        ));
    }

    #[test]
    fn blank_question_is_rejected() {
        let generator = Arc::new(ScriptedGenerator::replying("ok"));
        let qa = coordinator(&generator);
        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();

        assert!(matches!(
            qa.ask(&outcome.document_id, "   "),
            Err(SessionError::Rag(RagError::EmptyQuestion))
        ));
    }

    #[test]
    fn min_score_filters_weak_passages() {
        let generator = Arc::new(ScriptedGenerator::replying("nothing relevant"));
        let options = RagOptions {
            min_score: Some(1.5),
            ..RagOptions::default()
        };
        let qa = QaCoordinator::with_options(
            CharacterNgramEmbedder::default(),
            Arc::clone(&generator),
            SessionStore::default(),
            options,
        );
        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();

        let answer = qa.ask(&outcome.document_id, "pump").unwrap();
        assert!(answer.sources.is_empty());
    }

    #[test]
    fn failed_answer_leaves_session_untouched() {
        let generator = Arc::new(ScriptedGenerator::replying("Q1: a A1: b"));
        let qa = coordinator(&generator);
        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();
        let before = qa.store().get(&outcome.document_id).unwrap();

        generator.fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            qa.ask(&outcome.document_id, "pump?"),
            Err(SessionError::Rag(RagError::Generation(_)))
        ));

        let after = qa.store().get(&outcome.document_id).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.chunks.len(), outcome.chunk_count);
    }

    #[test]
    fn concurrent_questions_share_one_session() {
        let generator = Arc::new(ScriptedGenerator::replying("answer"));
        let qa = coordinator(&generator);
        let outcome = qa.ingest(&pages(), GenerationMode::Qa).unwrap();

        let answers: Vec<Answer> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| qa.ask(&outcome.document_id, "bearings").unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        for answer in &answers[1..] {
            assert_eq!(answer.sources, answers[0].sources);
        }
        assert_eq!(qa.health().sessions, 1);
    }
}
