//! Prompt construction for a batch of processes

use crate::models::ProcessRecord;

const INSTRUCTIONS: &str = "\
You are a digital forensics analyst reviewing a process listing recovered from a Windows memory image.
For each process below, give a short description of what the process is, decide whether it looks suspicious, \
and explain why. Consider the image name, parent/child relationship, session, creation and exit times, \
command line and path where available.";

const REPLY_FORMAT: &str = "\
Respond with ONLY a JSON array, one object per process, in this exact shape:
[{\"pid\": <pid>, \"description\": \"<what the process is>\", \"suspicious\": <true|false>, \"reason\": \"<why>\"}]
Use the pid values exactly as given. Do not wrap the array in markdown or add any other text.";

/// Build the request text for one batch
pub fn build_batch_prompt(batch: &[ProcessRecord]) -> Result<String, serde_json::Error> {
    let stripped: Vec<ProcessRecord> = batch.iter().map(ProcessRecord::without_annotation).collect();
    let processes = serde_json::to_string_pretty(&stripped)?;

    Ok(format!(
        "{INSTRUCTIONS}\n\nProcesses:\n{processes}\n\n{REPLY_FORMAT}"
    ))
}
