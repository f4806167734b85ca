//! Output formatting

use chord_ledger::{LedgerEvent, Receipt};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Output builder for formatted CLI output
pub struct Output {
    json_mode: bool,
    fields: BTreeMap<String, Value>,
    lines: Vec<String>,
}

impl Output {
    /// Create a new output builder
    pub fn new(json_mode: bool) -> Self {
        Self {
            json_mode,
            fields: BTreeMap::new(),
            lines: Vec::new(),
        }
    }

    /// Add a string field to the output
    pub fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Add a boolean field to the output
    pub fn field_bool(mut self, key: &str, value: bool) -> Self {
        self.fields.insert(key.to_string(), Value::Bool(value));
        self
    }

    /// Add a JSON value field to the output
    pub fn field_value(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Append a line to the human-readable message
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.lines.push(msg.into());
        self
    }

    /// Describe the events of a receipt
    pub fn receipt(self, receipt: &Receipt) -> Result<Self, serde_json::Error> {
        let events = serde_json::to_value(&receipt.events)?;
        let mut out = self
            .field("ledger", receipt.ledger)
            .field_bool("success", true)
            .field_value("events", events);
        for event in &receipt.events {
            out.lines.extend(describe(event));
        }
        Ok(out)
    }

    /// Print the output
    pub fn print(self) {
        if self.json_mode {
            let json = json!(self.fields);
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        } else if !self.lines.is_empty() {
            println!("{}", self.lines.join("\n"));
        }
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Human-readable lines for one event
fn describe(event: &LedgerEvent) -> Vec<String> {
    match event {
        LedgerEvent::Minted { operator, to, id, amount } => vec![
            "The owner minted tokens".to_string(),
            format!("Operator address: {operator}"),
            format!("Minted to: {to}"),
            format!("Token id: {id}"),
            format!("Amount: {amount}"),
        ],
        LedgerEvent::MintedBatch { operator, to, ids, amounts } => vec![
            "The owner minted a batch of tokens".to_string(),
            format!("Operator address: {operator}"),
            format!("Minted to: {to}"),
            format!("Token ids: [{}]", join(ids)),
            format!("Amounts: [{}]", join(amounts)),
        ],
        LedgerEvent::Transferred { operator, from, to, id, amount } => vec![
            "Tokens transferred".to_string(),
            format!("Operator address: {operator}"),
            format!("Transferred from address: {from}"),
            format!("Transferred to address: {to}"),
            format!("Token id: {id}"),
            format!("Amount: {amount}"),
        ],
        LedgerEvent::TransferredBatch { operator, from, to, ids, amounts } => vec![
            "Batch of tokens transferred".to_string(),
            format!("Operator address: {operator}"),
            format!("Transferred from address: {from}"),
            format!("Transferred to address: {to}"),
            format!("Token ids: [{}]", join(ids)),
            format!("Amounts: [{}]", join(amounts)),
        ],
        LedgerEvent::ApprovalChanged { account, operator, approved } => vec![
            if *approved { "Operator approved" } else { "Operator approval revoked" }.to_string(),
            format!("Account address: {account}"),
            format!("Operator address: {operator}"),
        ],
    }
}
