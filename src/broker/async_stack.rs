//! Read-only summary of suspended threads that likely belong to the same
//! logical asynchronous task. Heuristic only: shared worker-pool name
//! prefixes, and async framework markers near the top of the stack.

use crate::broker::error::Error;
use crate::broker::Broker;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Frames examined per thread when looking for framework markers.
const MARKER_FRAME_DEPTH: usize = 10;

/// Matches `pool-1-thread-3`, `worker-7`, `ForkJoinPool.commonPool-worker-2`
/// and the like, capturing the pool prefix.
static POOL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)[-_](?:thread[-_]?)?\d+$").expect("static pattern"));

const ASYNC_MARKERS: &[&str] = &[
    "java.util.concurrent.CompletableFuture",
    "java.util.concurrent.ForkJoin",
    "java.util.concurrent.ThreadPoolExecutor",
    "reactor.core",
    "kotlinx.coroutines",
    "io.netty.util.concurrent",
];

impl Broker {
    pub fn async_stack_summary(&self) -> Result<String, Error> {
        let target = self.target()?;

        let mut pools: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut marked: Vec<(String, String)> = Vec::new();

        for thread in target.all_threads()? {
            if !target.is_suspended(&thread).unwrap_or(false) {
                continue;
            }
            if let Some(captures) = POOL_NAME.captures(&thread.name) {
                pools
                    .entry(captures[1].to_string())
                    .or_default()
                    .push(thread.name.clone());
            }
            let Ok(frames) = target.frames(&thread) else {
                continue;
            };
            for frame in frames.iter().take(MARKER_FRAME_DEPTH) {
                if let Some(marker) = ASYNC_MARKERS
                    .iter()
                    .find(|m| frame.location.type_name.starts_with(*m))
                {
                    marked.push((thread.name.clone(), marker.to_string()));
                    break;
                }
            }
        }

        let mut out = String::new();
        for (prefix, members) in pools.iter().filter(|(_, members)| members.len() >= 2) {
            out.push_str(&format!(
                "pool `{prefix}`: {} suspended threads ({})\n",
                members.len(),
                members.join(", ")
            ));
        }
        for (thread, marker) in &marked {
            out.push_str(&format!("thread `{thread}` runs under {marker}\n"));
        }
        if out.is_empty() {
            out.push_str("no suspended threads look like parts of an asynchronous task");
        }
        Ok(out.trim_end().to_string())
    }
}
