use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::*;
use crate::config::DEFAULT_BATCH_SIZE;
use crate::models::FieldValue;

/// Replays canned replies in order and records every prompt it was sent
struct FakeGenerator {
    replies: Mutex<VecDeque<Result<String, AnnotateError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn new(replies: Vec<Result<String, AnnotateError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Echo every pid in the prompt back as a verdict
    fn echo(batches: usize) -> Arc<Self> {
        Self::new((0..batches).map(|_| Ok("__echo__".to_string())).collect())
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<String, AnnotateError> {
        self.prompts.lock().await.push(prompt.to_string());
        let reply = self.replies.lock().await.pop_front().unwrap_or(Err(AnnotateError::EmptyResponse))?;

        if reply != "__echo__" {
            return Ok(reply);
        }

        let verdicts: Vec<serde_json::Value> = prompt
            .lines()
            .filter_map(|l| l.trim().strip_prefix("\"pid\": "))
            .map(|pid| {
                let pid = pid.trim_end_matches(',');
                serde_json::json!({
                    "pid": serde_json::from_str::<serde_json::Value>(pid).unwrap(),
                    "description": format!("process {}", pid.trim_matches('"')),
                    "suspicious": false,
                    "reason": "echo"
                })
            })
            .collect();
        Ok(serde_json::to_string(&verdicts).unwrap())
    }
}

fn records(pids: &[i64]) -> Vec<ProcessRecord> {
    pids.iter().map(|&pid| ProcessRecord::new(FieldValue::Int(pid))).collect()
}

fn annotation(record: &ProcessRecord) -> &Annotation {
    record.annotation.as_ref().expect("record should be annotated")
}

#[tokio::test]
async fn test_fenced_reply_merges_by_pid() {
    let reply = "```json\n[{\"pid\":101,\"description\":\"x\",\"suspicious\":true,\"reason\":\"y\"}]\n```";
    let generator = FakeGenerator::new(vec![Ok(reply.to_string())]);
    let annotator = Annotator::new(generator, DEFAULT_BATCH_SIZE);

    let out = annotator.annotate(records(&[101])).await;

    assert_eq!(out.len(), 1);
    assert_eq!(annotation(&out[0]), &Annotation::new("x", true, "y"));
}

#[tokio::test]
async fn test_order_and_count_preserved_across_batch_sizes() {
    let pids: Vec<i64> = (1..=23).collect();

    for batch_size in [1, 2, 5, 10, 23, 50] {
        let batches = pids.len().div_ceil(batch_size);
        let generator = FakeGenerator::echo(batches);
        let annotator = Annotator::new(generator.clone(), batch_size);

        let out = annotator.annotate(records(&pids)).await;

        let out_pids: Vec<i64> = out.iter().filter_map(|r| r.pid.as_int()).collect();
        assert_eq!(out_pids, pids, "batch size {}", batch_size);
        assert_eq!(generator.prompts.lock().await.len(), batches);
        for record in &out {
            assert_eq!(annotation(record).description, format!("process {}", record.pid));
        }
    }
}

#[tokio::test]
async fn test_unparseable_reply_degrades_only_its_batch() {
    let generator = FakeGenerator::new(vec![
        Ok("I'm sorry, I cannot help with that.".to_string()),
        Ok("__echo__".to_string()),
    ]);
    let annotator = Annotator::new(generator, 2);

    let out = annotator.annotate(records(&[1, 2, 3])).await;

    assert_eq!(annotation(&out[0]), &parse_failure_annotation());
    assert_eq!(annotation(&out[1]), &parse_failure_annotation());
    assert_eq!(annotation(&out[2]).reason, "echo");
}

#[tokio::test]
async fn test_array_of_scalars_uses_parse_fallback() {
    let generator = FakeGenerator::new(vec![Ok(r#"[1, 2, "x"]"#.to_string())]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(records(&[1, 2])).await;

    assert!(out.iter().all(|r| annotation(r) == &parse_failure_annotation()));
}

#[tokio::test]
async fn test_description_column_is_replaced_by_verdict() {
    let listing = crate::parser::parse_listing("PID\tPPID\tdescription\n5\t1\tcolumn-text\n").unwrap();
    let reply = r#"[{"pid": 5, "description": "model", "suspicious": true, "reason": "r"}]"#;
    let generator = FakeGenerator::new(vec![Ok(reply.to_string())]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(listing.records).await;

    let text = serde_json::to_string(&out).unwrap();
    assert_eq!(text, r#"[{"pid":5,"ppid":1,"description":"model","suspicious":true,"reason":"r"}]"#);
}

#[tokio::test]
async fn test_failed_call_uses_parse_fallback() {
    let generator = FakeGenerator::new(vec![Err(AnnotateError::Status(503))]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(records(&[7, 8])).await;

    assert!(out.iter().all(|r| annotation(r) == &Annotation::new(
        "Analysis unavailable due to parsing error",
        false,
        "Could not parse AI response",
    )));
}

#[tokio::test]
async fn test_missing_pid_and_partial_fields() {
    let reply = r#"[{"pid": "10", "suspicious": true}, {"description": "no pid here"}]"#;
    let generator = FakeGenerator::new(vec![Ok(reply.to_string())]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(records(&[10, 11])).await;

    assert_eq!(annotation(&out[0]), &Annotation::new(DEFAULT_DESCRIPTION, true, DEFAULT_REASON));
    assert_eq!(annotation(&out[1]), &missing_annotation());
}

#[tokio::test]
async fn test_duplicate_pid_last_verdict_wins() {
    let reply = r#"[
        {"pid": 5, "description": "first", "suspicious": true, "reason": "a"},
        {"pid": 5, "description": "second", "suspicious": false, "reason": "b"}
    ]"#;
    let generator = FakeGenerator::new(vec![Ok(reply.to_string())]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(records(&[5])).await;

    assert_eq!(annotation(&out[0]), &Annotation::new("second", false, "b"));
}

#[tokio::test]
async fn test_text_pid_matches_by_value() {
    let mut record = ProcessRecord::new(FieldValue::from("0x1f"));
    record.image_file_name = Some("odd.exe".to_string());
    let reply = r#"{"pid": "0x1f", "description": "odd", "suspicious": true, "reason": "hex pid"}"#;
    let generator = FakeGenerator::new(vec![Ok(reply.to_string())]);
    let annotator = Annotator::new(generator, 10);

    let out = annotator.annotate(vec![record]).await;

    assert_eq!(annotation(&out[0]), &Annotation::new("odd", true, "hex pid"));
    assert_eq!(out[0].image_file_name.as_deref(), Some("odd.exe"));
}

#[tokio::test]
async fn test_zero_batch_size_is_clamped() {
    let generator = FakeGenerator::echo(2);
    let annotator = Annotator::new(generator, 0);
    assert_eq!(annotator.batch_size(), 1);

    let out = annotator.annotate(records(&[1, 2])).await;
    assert_eq!(out.len(), 2);
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let generator = FakeGenerator::new(vec![]);
    let annotator = Annotator::new(generator.clone(), 10);

    let out = annotator.annotate(Vec::new()).await;

    assert!(out.is_empty());
    assert!(generator.prompts.lock().await.is_empty());
}
