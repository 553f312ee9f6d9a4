use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::ProbeError;
use crate::messaging::Notifier;
use crate::models::{
    online_offline, overall_status, BlockInfo, DnsSeederStatus, Protocol, SiteStatus, StatusSnapshot,
};
use crate::probes::{content_matches, Prober};
use crate::snapshot::SharedSnapshot;
use crate::tracker::StateTracker;
use crate::utils::unix_now;

/// The poll-and-alert loop. Owns the state tracker; the snapshot is shared.
pub struct Monitor {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    pub state: SharedSnapshot,
    tracker: StateTracker,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        prober: Arc<dyn Prober>,
        state: SharedSnapshot,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let tracker = StateTracker::with_known_errors(config.error_transition_threshold, config.known_errors());
        Self { config, prober, state, tracker, notifier }
    }

    /// Polls until `shutdown` fires, then returns the known-error endpoints
    /// so they can be persisted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Vec<String> {
        info!(
            interval_secs = self.config.check_interval,
            threshold = self.config.error_transition_threshold,
            restored = self.tracker.known_errors().len(),
            "monitor loop starting"
        );
        let interval = Duration::from_secs(self.config.check_interval);

        loop {
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.changed() => break,
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("monitor loop stopped");
        self.tracker.known_errors()
    }

    /// One full probe cycle: probe, publish, track, announce.
    pub async fn run_cycle(&mut self) {
        let start_time = Instant::now();
        let previous_block = self.state.read().await.block;

        let dns_seeders = self.test_seeders().await;
        let websites = self.test_sites().await;
        let (block, tip_error) = self.test_tip(previous_block).await;

        let status = overall_status(&dns_seeders, &websites).to_string();
        for s in dns_seeders.iter().filter(|s| !s.error.is_empty()) {
            warn!(seeder = %s.name, error = %s.error, "DNS seeder needs attention");
        }
        for s in websites.iter().filter(|s| !s.error.is_empty()) {
            warn!(site = %s.name, protocol = %s.protocol, error = %s.error, "website needs attention");
        }

        let next = StatusSnapshot {
            dns_seeders,
            websites,
            block,
            status,
            last_updated: unix_now(),
            tip_error,
        };
        let prev = self.state.publish(next.clone()).await;

        for transition in self.tracker.track(&prev, &next) {
            let msg = transition.to_string();
            if transition.is_offline() { error!("{}", msg); } else { warn!("{}", msg); }
            self.announce(&msg).await;
        }

        if self.config.report_blocks
            && prev.block.block_height > 0
            && next.block.block_height > prev.block.block_height
        {
            let msg = format!("New block {} ({}) found.", next.block.block_height, next.block.block_hash);
            info!("{}", msg);
            self.announce(&msg).await;
        }

        info!(
            status = %next.status,
            seeders = next.dns_seeders.len(),
            websites = next.websites.len(),
            "cycle completed in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    async fn announce(&self, text: &str) {
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(text).await {
                warn!(error = %e, "failed to deliver alert");
            }
        }
    }

    async fn test_seeders(&self) -> Vec<DnsSeederStatus> {
        let mut out = Vec::new();
        for group in &self.config.dns_seeders {
            let hosts = group.host_list();
            let group_start = Instant::now();
            let mut online = 0;

            for host in &hosts {
                let started = Instant::now();
                let mut seeder = DnsSeederStatus { name: host.clone(), kind: group.name.clone(), ..Default::default() };
                match self.prober.resolve(host).await {
                    Ok(count) => {
                        online += 1;
                        seeder.node_count = count;
                        seeder.status = online_offline(true).into();
                        debug!(%host, count, "seeder OK in {:.2?}", started.elapsed());
                    }
                    Err(e) => {
                        seeder.status = online_offline(false).into();
                        seeder.error = e.to_string();
                        warn!(%host, error = %e, "seeder FAIL in {:.2?}", started.elapsed());
                    }
                }
                out.push(seeder);
            }

            info!(
                "{}/{} {} DNS seeders online in {:.2?}",
                online,
                hosts.len(),
                group.name,
                group_start.elapsed()
            );
        }
        out
    }

    async fn test_sites(&self) -> Vec<SiteStatus> {
        let mut out = Vec::new();
        for group in &self.config.websites {
            let mut total = 0;
            let mut online = 0;

            for (subdomain, fqdn) in group.targets() {
                let expected = group.expected_content(&subdomain);
                for protocol in Protocol::ALL {
                    if group.is_excluded(&fqdn, protocol) {
                        debug!(host = %fqdn, %protocol, "protocol excluded");
                        continue;
                    }
                    total += 1;
                    let site = self.test_site(&fqdn, protocol, expected).await;
                    if site.error.is_empty() {
                        online += 1;
                    }
                    out.push(site);
                }
            }

            info!("{}/{} {} site components online", online, total, group.host);
        }
        out
    }

    async fn test_site(&self, fqdn: &str, protocol: Protocol, expected: &str) -> SiteStatus {
        let url = format!("{}{}", protocol.scheme(), fqdn);
        let started = Instant::now();
        let fetched = self.prober.fetch(&url).await;
        let elapsed = started.elapsed();

        let mut site = SiteStatus {
            name: fqdn.to_string(),
            protocol,
            status: online_offline(false).into(),
            http_code: 0,
            content_size: 0,
            response_time: format!("{:.2?}", elapsed),
            error: String::new(),
        };

        match fetched {
            Ok(page) => {
                site.http_code = page.http_code;
                site.content_size = page.content_size;
                if content_matches(&page.body, expected) {
                    site.status = online_offline(true).into();
                } else {
                    site.error = ProbeError::ContentMismatch.to_string();
                }
            }
            Err(ProbeError::Status { code, content_size }) => {
                site.http_code = code;
                site.content_size = content_size;
                site.error = ProbeError::Status { code, content_size }.to_string();
            }
            Err(e) => site.error = e.to_string(),
        }

        if site.error.is_empty() {
            debug!(%url, "site OK in {}", site.response_time);
        } else {
            warn!(%url, error = %site.error, "site FAIL in {}", site.response_time);
        }
        site
    }

    async fn test_tip(&self, previous: BlockInfo) -> (BlockInfo, Option<String>) {
        match self.prober.tip().await {
            None => (previous, None),
            Some(Ok(mut block)) => {
                block.refresh(unix_now());
                info!(height = block.block_height, time = block.block_time, "tip: {}", block.status);
                (block, None)
            }
            Some(Err(e)) => {
                warn!(error = %e, "tip height query failed");
                (previous, Some(e.to_string()))
            }
        }
    }
}
