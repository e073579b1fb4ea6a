use std::sync::Mutex;

use tracing::{debug, info};

use crate::{
    ApiClient, CareerProgressSnapshot, EmbedError, SharedPage, Translations,
    logging::category_progress,
    page::{CLASS_COMPLETED, CLASS_PENDING},
    translations::{KEY_COMPLETED, KEY_IN_PROGRESS},
};

/// `round(completed / total * 100)`, half rounding up, and `0` for an empty
/// career.
pub fn progress_percent(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    let completed = u128::from(completed);
    let total = u128::from(total);
    ((completed * 200 + total) / (total * 2)) as u64
}

/// Pulls authoritative completion state and patches the page's progress bar
/// and step badges.
#[derive(Debug)]
pub struct ProgressSynchronizer {
    api: ApiClient,
    page: SharedPage,
    translations: Translations,
    last_snapshot: Mutex<Option<CareerProgressSnapshot>>,
}

impl ProgressSynchronizer {
    pub fn new(api: ApiClient, page: SharedPage, translations: Translations) -> Self {
        Self {
            api,
            page,
            translations,
            last_snapshot: Mutex::new(None),
        }
    }

    pub fn last_snapshot(&self) -> Option<CareerProgressSnapshot> {
        self.last_snapshot
            .lock()
            .expect("snapshot lock poisoned")
            .clone()
    }

    pub async fn refresh(
        &self,
        career_id: u64,
    ) -> Result<Option<CareerProgressSnapshot>, EmbedError> {
        let careers = self.api.list_careers().await?;
        let Some(entry) = careers.iter().find(|entry| entry.id == career_id) else {
            info!(
                "{} career {career_id} not in listing; leaving page untouched",
                category_progress()
            );
            return Ok(None);
        };

        let snapshot = CareerProgressSnapshot::from(entry);
        self.apply(&snapshot);
        *self.last_snapshot.lock().expect("snapshot lock poisoned") = Some(snapshot.clone());
        Ok(Some(snapshot))
    }

    pub fn apply(&self, snapshot: &CareerProgressSnapshot) {
        let percent = progress_percent(snapshot.completed_steps, snapshot.total_steps);
        let completed_text = self.translations.t(KEY_COMPLETED);
        let pending_text = self.translations.t(KEY_IN_PROGRESS);

        let mut page = self.page.lock().expect("page lock poisoned");
        if let Some(bar) = page.progress_bar_mut() {
            bar.width = format!("{percent}%");
            bar.aria_valuenow = percent.to_string();
            bar.label = format!("{percent}%");
        }
        page.set_progress_count(snapshot.completed_steps.to_string());

        let mut patched = 0usize;
        for step in &snapshot.steps {
            let Some(card) = page.step_card_mut(step.step_id) else {
                continue;
            };
            card.completed = Some(step.completed);
            if let Some(badge) = card.badge.as_mut() {
                badge.text = if step.completed {
                    completed_text.clone()
                } else {
                    pending_text.clone()
                };
                badge.toggle_class(CLASS_COMPLETED, step.completed);
                badge.toggle_class(CLASS_PENDING, !step.completed);
            }
            patched += 1;
        }

        debug!(
            "{} career {} at {percent}% ({}/{}), patched {patched} step cards",
            category_progress(),
            snapshot.career_id,
            snapshot.completed_steps,
            snapshot.total_steps
        );
    }
}
