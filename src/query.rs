//! Project-scoped retrieval and answer assembly.
//!
//! The query path embeds the question once with the same model used at
//! ingestion, asks the vector index for the nearest chunks within the
//! project, and hands the concatenated chunk texts to the chat collaborator
//! for a grounded answer.

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::index::VectorIndex;
use crate::llm::{self, ChatModel};
use crate::models::RetrievedChunk;
use crate::pipeline::Pipeline;

const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant helping with strategy research. \
     Answer the user's question based only on the context provided. \
     If the context doesn't contain the information needed to answer the question, \
     say \"I don't have enough information to answer that question.\" \
     Always cite the sources you used by referencing the document IDs.";

/// A source chunk that backed an answer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSource {
    pub document_id: String,
    pub text: String,
}

/// A grounded answer plus the chunks it was assembled from.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectAnswer {
    pub answer: String,
    pub sources: Vec<AnswerSource>,
}

/// Embed the question and fetch the nearest project-scoped chunks.
///
/// Results are ordered by the index's similarity ranking. The project filter
/// is applied inside the index, so a nearer chunk from another project can
/// never appear here.
pub async fn retrieve_context(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    question: &str,
    project_id: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, PipelineError> {
    let vector = embedder.embed_one(question).await?;
    let matches = index.query(&vector, project_id, top_k).await?;

    Ok(matches
        .into_iter()
        .map(|m| RetrievedChunk {
            document_id: m.document_id,
            text: m.text,
            score: m.score,
        })
        .collect())
}

/// Answer a question from a project's indexed documents.
pub async fn answer_question(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    chat: &dyn ChatModel,
    question: &str,
    project_id: &str,
    top_k: usize,
) -> Result<ProjectAnswer> {
    let retrieved = retrieve_context(embedder, index, question, project_id, top_k).await?;

    let context = retrieved
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let user = format!("Context information:\n{}\n\nQuestion: {}", context, question);

    let answer = chat.complete(ANSWER_SYSTEM_PROMPT, &user).await?;

    let sources = retrieved
        .into_iter()
        .map(|r| AnswerSource {
            document_id: r.document_id,
            text: r.text,
        })
        .collect();

    Ok(ProjectAnswer { answer, sources })
}

/// CLI entry point — ask a question against a project and print the answer.
pub async fn run_query(
    config: &Config,
    question: &str,
    project_id: &str,
    limit: Option<usize>,
) -> Result<()> {
    if question.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        anyhow::bail!("Queries require embeddings. Set [embedding] provider in config.");
    }

    let pipeline = Pipeline::from_config(config).await?;
    let chat = llm::create_chat_model(&config.answer)?;
    let top_k = limit.unwrap_or(config.retrieval.top_k);

    let result = answer_question(
        pipeline.embedder().as_ref(),
        pipeline.index().as_ref(),
        chat.as_ref(),
        question,
        project_id,
        top_k,
    )
    .await?;

    println!("{}", result.answer);
    println!();
    println!("--- Sources ({}) ---", result.sources.len());
    for source in &result.sources {
        let preview: String = source.text.chars().take(160).collect();
        println!("[{}] {}", source.document_id, preview);
    }
    Ok(())
}
