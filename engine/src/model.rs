//! Walk and observation records.

use crate::{error::Result, EntityId, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy in metres, when the receiver reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_m: None,
        }
    }

    /// Reject coordinates outside the WGS84 range.
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidPayload(format!(
                "latitude out of range: {}",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidPayload(format!(
                "longitude out of range: {}",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// One point of a recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPoint {
    pub location: Location,
    pub recorded_at: DateTime<Utc>,
}

/// Weather at the time of recording, as reported by the weather collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_kph: Option<f64>,
}

/// Reference to a photo or other media attached to an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// User-facing content of a walk: everything except identity and sync state.
///
/// This is also the payload sent to the remote store on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkFields {
    pub owner: String,
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_location: Option<Location>,
    #[serde(default)]
    pub path: Vec<PathPoint>,
    #[serde(default)]
    pub distance_m: f64,
    #[serde(default)]
    pub observation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
}

impl WalkFields {
    /// Start a new, still active walk.
    pub fn new(owner: impl Into<String>, name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            started_at,
            ended_at: None,
            start_location: None,
            end_location: None,
            path: Vec::new(),
            distance_m: 0.0,
            observation_count: 0,
            weather: None,
        }
    }

    /// Whether the walk has been completed.
    pub fn is_completed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::InvalidPayload("walk owner must not be blank".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidPayload("walk name must not be blank".into()));
        }
        if let Some(ended_at) = self.ended_at {
            if ended_at < self.started_at {
                return Err(Error::InvalidPayload("walk ends before it starts".into()));
            }
        }
        if !self.distance_m.is_finite() || self.distance_m < 0.0 {
            return Err(Error::InvalidPayload(format!(
                "invalid distance: {}",
                self.distance_m
            )));
        }
        for location in self
            .start_location
            .iter()
            .chain(self.end_location.iter())
            .chain(self.path.iter().map(|p| &p.location))
        {
            location.validate()?;
        }
        Ok(())
    }
}

/// Partial update to a walk.
///
/// `None` fields are left untouched; `append_path` is appended to the
/// existing track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub append_path: Vec<PathPoint>,
}

impl WalkPatch {
    /// Patch that completes a walk.
    pub fn complete(ended_at: DateTime<Utc>, end_location: Option<Location>, distance_m: f64) -> Self {
        Self {
            ended_at: Some(ended_at),
            end_location,
            distance_m: Some(distance_m),
            ..Self::default()
        }
    }

    /// Patch that appends track points.
    pub fn append_points(points: Vec<PathPoint>) -> Self {
        Self {
            append_path: points,
            ..Self::default()
        }
    }

    /// The end-of-walk fields of a completed walk, if it is completed.
    pub fn completion_of(fields: &WalkFields) -> Option<Self> {
        fields.ended_at.map(|ended_at| Self {
            ended_at: Some(ended_at),
            end_location: fields.end_location,
            distance_m: Some(fields.distance_m),
            ..Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidPayload("walk update changes nothing".into()));
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidPayload("walk name must not be blank".into()));
            }
        }
        if let Some(distance) = self.distance_m {
            if !distance.is_finite() || distance < 0.0 {
                return Err(Error::InvalidPayload(format!("invalid distance: {distance}")));
            }
        }
        for location in self
            .end_location
            .iter()
            .chain(self.append_path.iter().map(|p| &p.location))
        {
            location.validate()?;
        }
        Ok(())
    }

    /// Apply this patch to a walk's fields.
    pub fn apply_to(&self, fields: &mut WalkFields) {
        if let Some(name) = &self.name {
            fields.name = name.clone();
        }
        if let Some(ended_at) = self.ended_at {
            fields.ended_at = Some(ended_at);
        }
        if let Some(end_location) = self.end_location {
            fields.end_location = Some(end_location);
        }
        if let Some(distance) = self.distance_m {
            fields.distance_m = distance;
        }
        if let Some(count) = self.observation_count {
            fields.observation_count = count;
        }
        if let Some(weather) = &self.weather {
            fields.weather = Some(weather.clone());
        }
        fields.path.extend(self.append_path.iter().cloned());
    }
}

/// A walk as held in the local durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Walk {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: WalkFields,
    /// True while a queued mutation for this walk has not reached the remote store
    pub pending_sync: bool,
}

/// User-facing content of an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationFields {
    pub owner: String,
    pub text: String,
    pub category: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSnapshot>,
    #[serde(default)]
    pub media: Vec<MediaRef>,
    pub observed_at: DateTime<Utc>,
}

impl ObservationFields {
    pub fn new(
        owner: impl Into<String>,
        text: impl Into<String>,
        category: impl Into<String>,
        location: Location,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: owner.into(),
            text: text.into(),
            category: category.into(),
            location,
            weather: None,
            media: Vec::new(),
            observed_at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::InvalidPayload(
                "observation owner must not be blank".into(),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(Error::InvalidPayload(
                "observation text must not be blank".into(),
            ));
        }
        self.location.validate()
    }
}

/// An observation as held in the local durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: EntityId,
    /// Parent walk, provisional until the walk has been created remotely
    pub walk_id: EntityId,
    #[serde(flatten)]
    pub fields: ObservationFields,
    pub pending_sync: bool,
}
