//! Ask Without a Provider
//!
//! Wires the ask pipeline to toy in-process capabilities: a bag-of-letters
//! embedder and an answerer that shows the prompt it would have sent.
//! Swap in `OpenAiClient` for real answers.
//!
//! ```bash
//! cargo run --example ask_in_memory
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use quarry::{
    Answerer, Document, Embedder, Prompt, ProviderError, RagPipeline, RecursiveChunker, Retriever,
};

/// 26 letter frequencies, normalized.
struct Letters;

#[async_trait]
impl Embedder for Letters {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut counts = vec![0.0f32; 26];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            counts[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        let norm = counts.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
        Ok(counts.into_iter().map(|x| x / norm).collect())
    }
}

/// Returns the prompt instead of calling a model.
struct ShowPrompt;

#[async_trait]
impl Answerer for ShowPrompt {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        Ok(format!(
            "[system]\n{}\n\n[user]\n{}",
            prompt.system,
            prompt.last_user().unwrap_or_default()
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), quarry::Error> {
    let notes = [
        Document::from_source("dentist.html", "Dentist: Tuesday 9am, Dr. Alves, bring insurance card."),
        Document::from_source("wifi.html", "Guest wifi password is lemon-tree-42."),
        Document::from_source("books.html", "To read: The Dispossessed, Piranesi, Exhalation."),
    ];

    let mut retriever = Retriever::new(Arc::new(Letters), RecursiveChunker::prose(300, 100));
    let added = retriever.index_documents(&notes).await?;
    println!("Indexed {added} chunks\n");

    let pipeline = RagPipeline::new(retriever, Arc::new(ShowPrompt)).with_top_k(2);
    let answer = pipeline.ask_with_context("What is the wifi password?").await?;

    for hit in &answer.context {
        println!("{:>6.3}  {}", hit.distance, hit.chunk.source);
    }
    println!("\n{}", answer.text);
    Ok(())
}
