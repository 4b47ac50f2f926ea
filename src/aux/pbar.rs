use std::fmt::Write;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Progress bar for `len` pooled tasks; hidden unless `visible`.
pub fn prepare_pbar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(8));

    let template = match len {
        1.. => {
            "{spinner:.green} [{elapsed_precise}] {msg} [{bar:.cyan/blue}] {pos}/{len} chromosomes ({eta})"
        },
        0 => {
            "{spinner:.green} [{elapsed_precise}] {msg} [ ? ] {pos}"
        }
    };

    match ProgressStyle::with_template(template) {
        Ok(style) => pb.set_style(style.with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })),
        Err(e) => log::warn!("invalid progress template: {}", e),
    }

    pb
}

pub trait PBSummary {
    fn finish_with_summary(&self);
}

impl PBSummary for ProgressBar {
    /// Logs a one-line summary when the bar is hidden, then finishes it.
    fn finish_with_summary(&self) {
        if self.is_hidden() {
            let elapsed_secs = self.elapsed().as_secs_f64();
            log::debug!(
                "[{elapsed_precise}] {pos} tasks ({per_sec:.2}/s)",
                elapsed_precise = get_hms(elapsed_secs),
                pos = self.position(),
                per_sec = self.position() as f64 / elapsed_secs.max(f64::EPSILON),
            )
        }

        self.finish();
    }
}

#[inline]
pub fn get_hms(dur_secs: f64) -> String {
    let (hours, rem) = div_mod(dur_secs, 3600_f64);
    let (mins, rem) = div_mod(rem, 60_f64);
    let secs = rem % 60_f64;

    format!("{:0>2}:{:0>2}:{:0>4.1}", hours, mins, secs)
}

fn div_mod(n: f64, d: f64) -> (f64, f64) {
    ((n / d).trunc(), n % d)
}
