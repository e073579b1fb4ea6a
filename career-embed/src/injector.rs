use tracing::{debug, warn};

use crate::{
    AssetPolicy, Reactivity, ScriptHost, SharedPage, assets::is_urlish, logging::category_script,
    markup::extract_scripts,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MountReport {
    pub executed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Mounts untrusted markup into a region and re-runs its scripts from the
/// page body, one at a time in document order.
#[derive(Clone, Debug)]
pub struct SafeInjector {
    page: SharedPage,
    policy: AssetPolicy,
}

impl SafeInjector {
    pub fn new(page: SharedPage, policy: AssetPolicy) -> Self {
        Self { page, policy }
    }

    /// Opts the region out of reactivity scanning while its markup is in flux.
    pub fn suspend(&self, step_id: u64) {
        let mut page = self.page.lock().expect("page lock poisoned");
        if let Some(region) = page.region_mut(step_id) {
            region.reactivity_suspended = true;
        }
    }

    /// Mounts `markup` into the region and runs its scripts. `proceed` is
    /// consulted before each script; once it returns false the remaining
    /// scripts are skipped.
    pub async fn mount<H: ScriptHost>(
        &self,
        host: &H,
        step_id: u64,
        markup: &str,
        proceed: impl Fn() -> bool,
    ) -> MountReport {
        let scanned = extract_scripts(markup);
        {
            let mut page = self.page.lock().expect("page lock poisoned");
            let Some(region) = page.region_mut(step_id) else {
                return MountReport::default();
            };
            region.content = scanned.markup;
            region.mounted = true;
        }

        let mut report = MountReport::default();
        let total = scanned.scripts.len();
        for (index, script) in scanned.scripts.into_iter().enumerate() {
            if !proceed() {
                debug!(
                    "{} region {step_id} no longer wanted; skipping {} scripts",
                    category_script(),
                    total - index
                );
                report.skipped += total - index;
                break;
            }
            match (script.src, script.text) {
                (Some(src), _) => {
                    if !is_urlish(&src) || !self.policy.allows(&src) {
                        warn!(
                            "{} dropped embedded script with unusable src {src}",
                            category_script()
                        );
                        report.skipped += 1;
                        continue;
                    }
                    let appended = {
                        let mut page = self.page.lock().expect("page lock poisoned");
                        page.append_external_script(&src)
                    };
                    if !appended {
                        debug!("{} embedded script already present {src}", category_script());
                        report.skipped += 1;
                        continue;
                    }
                    match host.load(&src).await {
                        Ok(()) => report.executed += 1,
                        Err(reason) => {
                            warn!(
                                "{} embedded script failed {src}: {reason}",
                                category_script()
                            );
                            report.failed += 1;
                        }
                    }
                }
                (None, text) => {
                    let text = text.unwrap_or_default();
                    if !self.policy.allows_inline_scripts() {
                        warn!(
                            "{} inline scripts disabled; dropped {} bytes",
                            category_script(),
                            text.len()
                        );
                        report.skipped += 1;
                        continue;
                    }
                    {
                        let mut page = self.page.lock().expect("page lock poisoned");
                        page.append_inline_script(&text);
                    }
                    match host.run_inline(&text) {
                        Ok(()) => report.executed += 1,
                        Err(reason) => {
                            warn!("{} inline script failed: {reason}", category_script());
                            report.failed += 1;
                        }
                    }
                }
            }
        }

        debug!(
            "{} mounted region {step_id}: executed={} failed={} skipped={}",
            category_script(),
            report.executed,
            report.failed,
            report.skipped
        );
        report
    }

    /// Lifts the suspension and lets the reactivity library take over the
    /// region.
    pub fn resume<R: Reactivity>(&self, reactivity: &R, step_id: u64) {
        {
            let mut page = self.page.lock().expect("page lock poisoned");
            match page.region_mut(step_id) {
                Some(region) => region.reactivity_suspended = false,
                None => return,
            }
        }
        reactivity.init_tree(step_id);
    }
}
