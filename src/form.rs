// Form state: field values, loading flag, and the submit flow
//
// The loading flag admits one submission at a time. It is taken with a
// compare-and-swap and released by `LoadingGuard::drop`, so every exit path
// of `submit` (success, API failure, early return) clears it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::ai::{CompletionClient, FieldName, FormFields, assemble_prompt, build_messages};
use crate::error::{Error, Result};
use crate::history::SubmissionLog;
use crate::render::RenderedResult;

pub const LABEL_IDLE: &str = "作成する";
pub const LABEL_LOADING: &str = "作成中...";

/// Lock ignoring poison: the guarded values stay valid after a panicking writer.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// RAII guard that clears the loading flag on drop
pub struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LoadingGuard<'a> {
    /// Set the flag if it is clear. `None` if a submission is already running.
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LoadingGuard { flag })
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct FormState {
    fields: Mutex<FormFields>,
    is_loading: AtomicBool,
    result: Mutex<Option<RenderedResult>>,
    last_error: Mutex<Option<String>>,
}

impl Default for FormState {
    fn default() -> Self {
        Self::new(FormFields::default())
    }
}

impl FormState {
    pub fn new(fields: FormFields) -> Self {
        FormState {
            fields: Mutex::new(fields),
            is_loading: AtomicBool::new(false),
            result: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn fields(&self) -> FormFields {
        lock(&self.fields).clone()
    }

    pub fn set_field(&self, field: FieldName, value: impl Into<String>) {
        lock(&self.fields).set(field, value);
    }

    /// Apply `{wireName: value}` updates. Nothing changes if any name is unknown.
    pub fn apply_updates(&self, updates: &HashMap<String, String>) -> Result<FormFields> {
        let parsed = updates
            .iter()
            .map(|(name, value)| FieldName::from_wire_name(name).map(|field| (field, value)))
            .collect::<Result<Vec<_>>>()?;

        let mut fields = lock(&self.fields);
        for (field, value) in parsed {
            fields.set(field, value.as_str());
        }
        Ok(fields.clone())
    }

    /// Restore the initial defaults
    pub fn reset_fields(&self) -> FormFields {
        let mut fields = lock(&self.fields);
        *fields = FormFields::default();
        fields.clone()
    }

    /// Prompt that a submit would send right now
    pub fn preview_prompt(&self) -> String {
        assemble_prompt(&lock(&self.fields))
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::Acquire)
    }

    pub fn begin_loading(&self) -> Option<LoadingGuard<'_>> {
        LoadingGuard::acquire(&self.is_loading)
    }

    pub fn button_label(&self) -> &'static str {
        if self.is_loading() {
            LABEL_LOADING
        } else {
            LABEL_IDLE
        }
    }

    pub fn result(&self) -> Option<RenderedResult> {
        lock(&self.result).clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Run one submission.
    ///
    /// - Already loading: `Error::Busy`, nothing else happens.
    /// - Success: result stored, entry appended to `log`, error cleared.
    /// - Failure: error message stored; fields, previous result and log untouched.
    pub async fn submit(
        &self,
        client: &dyn CompletionClient,
        log: &Mutex<SubmissionLog>,
    ) -> Result<RenderedResult> {
        let _guard = self.begin_loading().ok_or(Error::Busy)?;

        let snapshot = self.fields();
        let messages = build_messages(&snapshot);
        let input = messages
            .first()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        tracing::info!(client = %client.describe(), prompt_chars = input.chars().count(), "submitting prompt");
        let started = std::time::Instant::now();

        let output = match client.complete(messages).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, elapsed_ms = started.elapsed().as_millis() as u64, "completion failed");
                *lock(&self.last_error) = Some(e.to_string());
                return Err(e);
            }
        };
        tracing::info!(
            output_chars = output.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "completion finished"
        );

        let rendered = RenderedResult::new(output.clone());
        *lock(&self.result) = Some(rendered.clone());

        // A persistence failure keeps the entry in memory and is reported, not fatal
        let persisted = lock(log).append(input, output);
        *lock(&self.last_error) = persisted
            .err()
            .map(|e| format!("履歴の保存に失敗しました: {}", e));

        Ok(rendered)
    }
}
