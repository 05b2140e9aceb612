//! The save-and-edit step between a capture and the store.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::models::{Measure, NewMeasure, ToolKind, ToolReading};
use crate::db::Database;
use crate::error::FinalizeError;
use crate::navigation::{NavigationRequest, SessionBundle};
use crate::tools::{barometer, magnetometer, ruler};

/// One received capture awaiting the user's title and confirmation.
///
/// A step is built from exactly one bundle. On a failed commit it keeps the
/// reading and the entered metadata so the user can retry.
#[derive(Debug, Clone)]
pub struct FinalizeStep {
    bundle_id: Uuid,
    reading: ToolReading,
    title: String,
    start_date: DateTime<Utc>,
    committed: Option<Measure>,
}

impl FinalizeStep {
    /// Decodes the bundle carried by a save action. Nothing is stored.
    ///
    /// The start date defaults to the moment the tool froze the reading,
    /// or to now for a bundle that does not carry one.
    pub fn receive(request: NavigationRequest) -> Result<Self, FinalizeError> {
        let kind = ToolKind::from_save_action(&request.action)
            .ok_or_else(|| FinalizeError::UnknownAction(request.action.clone()))?;
        let reading = decode_reading(kind, &request.bundle)?;

        Ok(Self {
            bundle_id: request.bundle.id(),
            reading,
            title: String::new(),
            start_date: request.bundle.captured_at().unwrap_or_else(Utc::now),
            committed: None,
        })
    }

    pub fn bundle_id(&self) -> Uuid {
        self.bundle_id
    }

    pub fn kind(&self) -> ToolKind {
        self.reading.kind()
    }

    pub fn reading(&self) -> ToolReading {
        self.reading
    }

    /// Read-only rendering of the captured value.
    pub fn preview(&self) -> String {
        self.reading.describe()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn set_start_date(&mut self, start_date: DateTime<Utc>) {
        self.start_date = start_date;
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    pub fn committed(&self) -> Option<&Measure> {
        self.committed.as_ref()
    }

    /// Stores the measure and its reading atomically.
    pub async fn commit(&mut self, db: &Database) -> Result<Measure, FinalizeError> {
        if self.committed.is_some() {
            return Err(FinalizeError::AlreadyCommitted);
        }

        let title = self.title.trim();
        if title.is_empty() {
            return Err(FinalizeError::MissingTitle);
        }

        let record = NewMeasure::new(title, self.start_date);
        let measure = db.commit_measure(&record, &self.reading).await?;
        self.committed = Some(measure.clone());
        Ok(measure)
    }
}

fn decode_reading(kind: ToolKind, bundle: &SessionBundle) -> Result<ToolReading, FinalizeError> {
    let float = |key: &str| {
        bundle
            .float(key)
            .ok_or_else(|| FinalizeError::MissingBundleValue(key.to_string()))
    };

    let reading = match kind {
        ToolKind::Barometer => ToolReading::Barometer {
            pressure: float(barometer::PRESSURE_KEY)?,
        },
        ToolKind::Magnetometer => ToolReading::Magnetometer {
            x: float(magnetometer::X_KEY)?,
            y: float(magnetometer::Y_KEY)?,
            z: float(magnetometer::Z_KEY)?,
        },
        ToolKind::Ruler => ToolReading::Ruler {
            length: float(ruler::LENGTH_KEY)?,
        },
    };
    Ok(reading)
}

#[derive(Debug)]
pub enum CommitOutcome {
    Committed(Measure),
    /// The step comes back untouched apart from the failed attempt.
    Failed(FinalizeStep, FinalizeError),
    /// The attachment ended while the store was busy.
    Discarded,
}

/// Runs the commit off the lifecycle owner.
///
/// `attachment` is the delegate's attachment token. If it is cancelled by the
/// time the store replies, the outcome is dropped.
pub fn spawn_commit(
    mut step: FinalizeStep,
    db: Database,
    attachment: CancellationToken,
) -> JoinHandle<CommitOutcome> {
    tokio::spawn(async move {
        let result = step.commit(&db).await;

        if attachment.is_cancelled() {
            warn!("Attachment ended during commit of bundle {}; discarding result", step.bundle_id);
            return CommitOutcome::Discarded;
        }

        match result {
            Ok(measure) => {
                info!("Measure {} ready for the host", measure.id);
                CommitOutcome::Committed(measure)
            }
            Err(err) => {
                error!("Commit of bundle {} failed: {err}", step.bundle_id);
                CommitOutcome::Failed(step, err)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::StoreError;

    fn barometer_request(pressure: f64) -> NavigationRequest {
        let mut bundle = SessionBundle::new();
        bundle.put_float(barometer::PRESSURE_KEY, pressure);
        NavigationRequest::new(ToolKind::Barometer.save_action(), bundle)
    }

    #[test]
    fn receive_decodes_each_tool() {
        let step = FinalizeStep::receive(barometer_request(1013.2)).unwrap();
        assert_eq!(step.reading(), ToolReading::Barometer { pressure: 1013.2 });
        assert_eq!(step.preview(), "1013.2 hPa");

        let mut bundle = SessionBundle::new();
        bundle
            .put_float(magnetometer::X_KEY, 1.0)
            .put_float(magnetometer::Y_KEY, 2.0)
            .put_float(magnetometer::Z_KEY, 3.0);
        let step = FinalizeStep::receive(NavigationRequest::new(
            ToolKind::Magnetometer.save_action(),
            bundle,
        ))
        .unwrap();
        assert_eq!(step.kind(), ToolKind::Magnetometer);

        let mut bundle = SessionBundle::new();
        bundle.put_float(ruler::LENGTH_KEY, 12.5);
        let step =
            FinalizeStep::receive(NavigationRequest::new(ToolKind::Ruler.save_action(), bundle))
                .unwrap();
        assert_eq!(step.preview(), "12.5 cm");
    }

    #[test]
    fn receive_rejects_unknown_actions_and_missing_keys() {
        let err = FinalizeStep::receive(NavigationRequest::new("open_settings", SessionBundle::new()))
            .unwrap_err();
        assert!(matches!(err, FinalizeError::UnknownAction(action) if action == "open_settings"));

        let mut bundle = SessionBundle::new();
        bundle.put_float(magnetometer::X_KEY, 1.0);
        let err = FinalizeStep::receive(NavigationRequest::new(
            ToolKind::Magnetometer.save_action(),
            bundle,
        ))
        .unwrap_err();
        assert!(matches!(err, FinalizeError::MissingBundleValue(key) if key == magnetometer::Y_KEY));
    }

    #[test]
    fn start_date_defaults_to_the_capture_time() {
        let captured = Utc.with_ymd_and_hms(2024, 3, 1, 7, 45, 0).unwrap();
        let mut request = barometer_request(1009.0);
        request.bundle.set_captured_at(captured);

        let step = FinalizeStep::receive(request).unwrap();
        assert_eq!(step.start_date(), captured);

        let before = Utc::now();
        let step = FinalizeStep::receive(barometer_request(1009.0)).unwrap();
        assert!(step.start_date() >= before);
    }

    #[tokio::test]
    async fn commit_requires_a_title() {
        let db = Database::in_memory().unwrap();
        let mut step = FinalizeStep::receive(barometer_request(1000.0)).unwrap();
        step.set_title("   ");

        assert!(matches!(step.commit(&db).await, Err(FinalizeError::MissingTitle)));
        assert_eq!(db.count_measures().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn commit_stores_the_composite_once() {
        let db = Database::in_memory().unwrap();
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut step = FinalizeStep::receive(barometer_request(1013.2)).unwrap();
        step.set_title(" Morning ");
        step.set_start_date(date);

        let measure = step.commit(&db).await.unwrap();
        assert_eq!(measure.title, "Morning");
        assert_eq!(measure.start_date, date);
        assert!(step.is_committed());

        let composite = db.get_composite(measure.id).await.unwrap().unwrap();
        assert_eq!(composite.reading, ToolReading::Barometer { pressure: 1013.2 });

        assert!(matches!(step.commit(&db).await, Err(FinalizeError::AlreadyCommitted)));
        assert_eq!(db.count_measures().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_commit_keeps_input_for_retry() {
        let db = Database::in_memory().unwrap();
        let mut bundle = SessionBundle::new();
        bundle.put_float(ruler::LENGTH_KEY, -4.0);
        let mut step =
            FinalizeStep::receive(NavigationRequest::new(ToolKind::Ruler.save_action(), bundle))
                .unwrap();
        step.set_title("Desk");

        let err = step.commit(&db).await.unwrap_err();
        assert!(matches!(err, FinalizeError::Store(StoreError::InvalidReading(_))));
        assert!(!step.is_committed());
        assert_eq!(step.title(), "Desk");
        assert_eq!(step.reading(), ToolReading::Ruler { length: -4.0 });
        assert!(db.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn spawned_commit_reports_the_outcome() {
        let db = Database::in_memory().unwrap();
        let mut step = FinalizeStep::receive(barometer_request(990.0)).unwrap();
        step.set_title("Storm");

        let outcome = spawn_commit(step, db.clone(), CancellationToken::new())
            .await
            .unwrap();
        let measure = match outcome {
            CommitOutcome::Committed(measure) => measure,
            other => panic!("expected a committed measure, got {other:?}"),
        };
        assert_eq!(db.get_latest().await.unwrap(), Some(measure));
    }

    #[tokio::test]
    async fn spawned_commit_after_detach_is_discarded() {
        let db = Database::in_memory().unwrap();
        let mut step = FinalizeStep::receive(barometer_request(990.0)).unwrap();
        step.set_title("Storm");
        let attachment = CancellationToken::new();
        attachment.cancel();

        let outcome = spawn_commit(step, db, attachment).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Discarded));
    }

    #[tokio::test]
    async fn spawned_commit_failure_returns_the_step() {
        let db = Database::in_memory().unwrap();
        let step = FinalizeStep::receive(barometer_request(990.0)).unwrap();

        let outcome = spawn_commit(step, db, CancellationToken::new()).await.unwrap();
        let (step, err) = match outcome {
            CommitOutcome::Failed(step, err) => (step, err),
            other => panic!("expected a failed commit, got {other:?}"),
        };
        assert!(matches!(err, FinalizeError::MissingTitle));
        assert_eq!(step.reading(), ToolReading::Barometer { pressure: 990.0 });
    }
}
