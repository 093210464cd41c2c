//! Classify command - show how a question would be routed

use anyhow::Result;

use vidrecall::retrieval::intent::classify;

pub fn execute(question: &str, max_chars: usize, json: bool) -> Result<()> {
    let classification = classify(question, max_chars)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    } else {
        println!(
            "{} (confidence {:.2})",
            classification.query_type, classification.confidence
        );
    }
    Ok(())
}
