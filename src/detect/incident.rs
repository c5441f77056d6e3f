//! Incident tracking: converts the stream of per-evaluation statuses into a
//! durable log of contiguous bad periods, one open incident per device.

use crate::detect::{Severity, StatusMode, SystemStatus};
use crate::storage::Pool;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// A contiguous span of WARNING/DANGER statuses for one device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: Uuid,
    pub device_id: String,
    pub mode: StatusMode,
    pub severity: Severity,
    pub start_time: DateTime<Utc>,
    /// None only transiently; set on every extension and fixed at close.
    pub end_time: Option<DateTime<Utc>>,
    pub is_open: bool,
    /// Highest concentration seen while the incident was open.
    pub max_value: f64,
    /// Highest classifier probability seen, if the classifier ever scored.
    pub max_probability: Option<f64>,
}

/// Rollup over a trailing window, for the reporting side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentSummary {
    pub device_id: String,
    pub window_hours: i64,
    pub total_incidents: usize,
    pub danger_incidents: usize,
    pub max_value_peak: Option<f64>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub incidents: Vec<Incident>,
}

pub struct IncidentTracker {
    pool: Pool,
    // Serializes find-open/mutate/save per device. Two concurrent evaluations
    // for the same device must not both conclude "nothing open" and insert.
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IncidentTracker {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn device_lock(&self, device_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Feed one fused status into the per-device state machine.
    ///
    /// Good status closes the open incident (if any). Bad status opens a new
    /// incident or extends the open one, escalating monotonically. Returns
    /// the incident touched by this evaluation, if any.
    pub async fn observe(
        &self,
        device_id: &str,
        status: &SystemStatus,
        last_value: f64,
        probability: Option<f64>,
    ) -> Result<Option<Incident>> {
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let open = self.find_open(device_id)?;

        if !status.severity.is_bad() {
            return match open {
                Some(incident) => Ok(Some(self.close(incident, now)?)),
                None => Ok(None),
            };
        }

        match open {
            None => Ok(Some(self.open_new(
                device_id,
                status,
                last_value,
                probability,
                now,
            )?)),
            Some(incident) => Ok(Some(self.extend(
                incident,
                status,
                last_value,
                probability,
                now,
            )?)),
        }
    }

    /// The single open incident for a device, if one exists.
    pub fn find_open(&self, device_id: &str) -> Result<Option<Incident>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, device_id, mode, severity, start_time, end_time, is_open,
                    max_value, max_probability
             FROM incidents WHERE device_id = ?1 AND is_open = 1 LIMIT 1",
        )?;

        let mut rows = stmt.query_map(params![device_id], map_incident)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn open_new(
        &self,
        device_id: &str,
        status: &SystemStatus,
        last_value: f64,
        probability: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Incident> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO incidents (id, device_id, mode, severity, start_time, end_time,
                                    is_open, max_value, max_probability, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, ?9)",
            params![
                id.to_string(),
                device_id,
                status.mode.as_str(),
                status.severity.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
                last_value,
                probability,
                now.to_rfc3339(),
            ],
        )?;

        tracing::info!(device=%device_id, mode=%status.mode.as_str(), severity=%status.severity.as_str(), "Incident opened");

        Ok(Incident {
            id,
            device_id: device_id.to_string(),
            mode: status.mode,
            severity: status.severity,
            start_time: now,
            end_time: Some(now),
            is_open: true,
            max_value: last_value,
            max_probability: probability,
        })
    }

    fn extend(
        &self,
        mut incident: Incident,
        status: &SystemStatus,
        last_value: f64,
        probability: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Incident> {
        // Severity only ever escalates while open. Mode tracks the latest
        // evaluation; peaks are monotonic.
        incident.severity = incident.severity.max(status.severity);
        incident.mode = status.mode;
        incident.end_time = Some(now);
        incident.max_value = incident.max_value.max(last_value);
        incident.max_probability = match (incident.max_probability, probability) {
            (Some(prev), Some(cur)) => Some(prev.max(cur)),
            (Some(prev), None) => Some(prev),
            (None, cur) => cur,
        };

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE incidents
             SET mode = ?2, severity = ?3, end_time = ?4, max_value = ?5,
                 max_probability = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                incident.id.to_string(),
                incident.mode.as_str(),
                incident.severity.as_str(),
                now.to_rfc3339(),
                incident.max_value,
                incident.max_probability,
                now.to_rfc3339(),
            ],
        )?;

        Ok(incident)
    }

    fn close(&self, mut incident: Incident, now: DateTime<Utc>) -> Result<Incident> {
        let conn = self.pool.get()?;

        // end_time stays at the last bad evaluation; closing only flips the flag.
        conn.execute(
            "UPDATE incidents SET is_open = 0, updated_at = ?2 WHERE id = ?1",
            params![incident.id.to_string(), now.to_rfc3339()],
        )?;

        incident.is_open = false;
        tracing::info!(device=%incident.device_id, id=%incident.id, "Incident closed");
        Ok(incident)
    }

    /// Recent incidents, newest start first.
    pub fn list_recent(&self, device_id: Option<&str>, limit: usize) -> Result<Vec<Incident>> {
        let conn = self.pool.get()?;

        let mut incidents = Vec::new();
        match device_id {
            Some(dev) => {
                let mut stmt = conn.prepare(
                    "SELECT id, device_id, mode, severity, start_time, end_time, is_open,
                            max_value, max_probability
                     FROM incidents WHERE device_id = ?1
                     ORDER BY start_time DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![dev, limit], map_incident)?;
                for r in rows {
                    incidents.push(r?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, device_id, mode, severity, start_time, end_time, is_open,
                            max_value, max_probability
                     FROM incidents ORDER BY start_time DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], map_incident)?;
                for r in rows {
                    incidents.push(r?);
                }
            }
        }
        Ok(incidents)
    }

    /// Pure read-side aggregation over a trailing window. Not part of the
    /// state machine.
    pub fn summary(&self, device_id: &str, window_hours: i64) -> Result<IncidentSummary> {
        let to = Utc::now();
        let from = to - Duration::hours(window_hours);

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, device_id, mode, severity, start_time, end_time, is_open,
                    max_value, max_probability
             FROM incidents
             WHERE device_id = ?1 AND start_time >= ?2
             ORDER BY start_time DESC",
        )?;

        let rows = stmt.query_map(params![device_id, from.to_rfc3339()], map_incident)?;
        let mut incidents = Vec::new();
        for r in rows {
            incidents.push(r?);
        }

        let danger_incidents = incidents
            .iter()
            .filter(|i| i.severity == Severity::Danger)
            .count();
        let max_value_peak = incidents
            .iter()
            .map(|i| i.max_value)
            .fold(None, |acc: Option<f64>, v| {
                Some(acc.map_or(v, |a| a.max(v)))
            });

        Ok(IncidentSummary {
            device_id: device_id.to_string(),
            window_hours,
            total_incidents: incidents.len(),
            danger_incidents,
            max_value_peak,
            from,
            to,
            incidents,
        })
    }
}

fn map_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<Incident> {
    let id_str: String = row.get(0)?;
    let mode_str: String = row.get(2)?;
    let sev_str: String = row.get(3)?;
    let start_str: String = row.get(4)?;
    let end_str: Option<String> = row.get(5)?;
    let is_open: i64 = row.get(6)?;

    Ok(Incident {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        device_id: row.get(1)?,
        mode: StatusMode::parse(&mode_str),
        severity: Severity::parse(&sev_str),
        start_time: chrono::DateTime::parse_from_rfc3339(&start_str)
            .unwrap_or_default()
            .with_timezone(&Utc),
        end_time: end_str.map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .unwrap_or_default()
                .with_timezone(&Utc)
        }),
        is_open: is_open != 0,
        max_value: row.get(7)?,
        max_probability: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Severity, StatusMode, SystemStatus};
    use crate::storage::open_pool;

    fn status(mode: StatusMode, severity: Severity) -> SystemStatus {
        SystemStatus {
            mode,
            severity,
            message: String::new(),
        }
    }

    fn test_tracker() -> (tempfile::TempDir, IncidentTracker) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("incidents.db");
        let pool = open_pool(path.to_str().unwrap()).unwrap();
        (dir, IncidentTracker::new(pool))
    }

    #[tokio::test]
    async fn test_good_status_without_open_incident_is_noop() {
        let (_dir, tracker) = test_tracker();
        let touched = tracker
            .observe("esp-01", &status(StatusMode::Normal, Severity::Ok), 100.0, None)
            .await
            .unwrap();
        assert!(touched.is_none());
        assert!(tracker.find_open("esp-01").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_open_escalate_close() {
        let (_dir, tracker) = test_tracker();
        let dev = "esp-01";

        // HIGH_GAS opens at WARNING
        let inc = tracker
            .observe(dev, &status(StatusMode::HighGas, Severity::Warning), 650.0, None)
            .await
            .unwrap()
            .unwrap();
        assert!(inc.is_open);
        assert_eq!(inc.severity, Severity::Warning);
        assert_eq!(inc.max_value, 650.0);
        assert_eq!(inc.max_probability, None);

        // EARLY_WARNING extends; first probability observation wins
        let inc = tracker
            .observe(
                dev,
                &status(StatusMode::EarlyWarning, Severity::Warning),
                620.0,
                Some(0.8),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inc.mode, StatusMode::EarlyWarning);
        assert_eq!(inc.max_value, 650.0); // did not decrease
        assert_eq!(inc.max_probability, Some(0.8));

        // LEAK_CONFIRMED escalates to DANGER
        let inc = tracker
            .observe(
                dev,
                &status(StatusMode::LeakConfirmed, Severity::Danger),
                700.0,
                Some(0.95),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inc.severity, Severity::Danger);
        assert_eq!(inc.max_value, 700.0);
        assert_eq!(inc.max_probability, Some(0.95));
        let danger_end = inc.end_time.unwrap();

        // Back to WARNING: severity must NOT downgrade, probability must not drop
        let inc = tracker
            .observe(dev, &status(StatusMode::HighGas, Severity::Warning), 630.0, Some(0.4))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inc.severity, Severity::Danger);
        assert_eq!(inc.max_probability, Some(0.95));

        // NORMAL closes; end_time stays at the last bad evaluation
        let inc = tracker
            .observe(dev, &status(StatusMode::Normal, Severity::Ok), 90.0, None)
            .await
            .unwrap()
            .unwrap();
        assert!(!inc.is_open);
        assert!(inc.end_time.unwrap() >= danger_end);
        assert!(tracker.find_open(dev).unwrap().is_none());

        // Exactly one incident row exists for the device
        let all = tracker.list_recent(Some(dev), 10).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].severity, Severity::Danger);
    }

    #[tokio::test]
    async fn test_reopen_creates_new_incident() {
        let (_dir, tracker) = test_tracker();
        let dev = "esp-02";
        let bad = status(StatusMode::HighGas, Severity::Warning);
        let good = status(StatusMode::Normal, Severity::Ok);

        let first = tracker.observe(dev, &bad, 650.0, None).await.unwrap().unwrap();
        tracker.observe(dev, &good, 90.0, None).await.unwrap();
        let second = tracker.observe(dev, &bad, 660.0, None).await.unwrap().unwrap();

        assert_ne!(first.id, second.id);
        assert!(second.start_time >= first.start_time);
        assert_eq!(tracker.list_recent(Some(dev), 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_at_most_one_open_per_device() {
        let (_dir, tracker) = test_tracker();
        let bad = status(StatusMode::HighGas, Severity::Warning);

        for v in [650.0, 660.0, 670.0] {
            tracker.observe("esp-03", &bad, v, None).await.unwrap();
        }
        tracker.observe("esp-04", &bad, 700.0, None).await.unwrap();

        let open_03: Vec<_> = tracker
            .list_recent(Some("esp-03"), 10)
            .unwrap()
            .into_iter()
            .filter(|i| i.is_open)
            .collect();
        assert_eq!(open_03.len(), 1);
        assert_eq!(open_03[0].max_value, 670.0);

        // Devices are independent
        assert!(tracker.find_open("esp-04").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_summary_rollup() {
        let (_dir, tracker) = test_tracker();
        let dev = "esp-05";
        let good = status(StatusMode::Normal, Severity::Ok);

        tracker
            .observe(dev, &status(StatusMode::HighGas, Severity::Warning), 640.0, None)
            .await
            .unwrap();
        tracker.observe(dev, &good, 90.0, None).await.unwrap();

        tracker
            .observe(
                dev,
                &status(StatusMode::LeakConfirmed, Severity::Danger),
                810.0,
                Some(0.99),
            )
            .await
            .unwrap();
        tracker.observe(dev, &good, 85.0, None).await.unwrap();

        let summary = tracker.summary(dev, 24).unwrap();
        assert_eq!(summary.total_incidents, 2);
        assert_eq!(summary.danger_incidents, 1);
        assert_eq!(summary.max_value_peak, Some(810.0));
        // newest start first
        assert_eq!(summary.incidents[0].severity, Severity::Danger);
    }
}
