//! Shadow comparison of the two permission models.

use run_authz_sdk::{
    AuthorizationDecision, AuthorizationRequest, ComparisonRecord, DecisionSource, RunAuthzError,
};

use super::events::EventEmitter;

/// Compares attribute and relationship results for one request and returns
/// the authoritative side. Fallback is not its concern.
#[derive(Clone)]
pub struct DecisionComparator {
    events: EventEmitter,
}

impl DecisionComparator {
    #[must_use]
    pub fn new(events: EventEmitter) -> Self {
        Self { events }
    }

    /// [`DecisionComparator::evaluate`], then queue the record for the sink.
    ///
    /// # Errors
    ///
    /// The authoritative side's error, unchanged.
    pub fn compare(
        &self,
        request: &AuthorizationRequest,
        attribute: Result<&AuthorizationDecision, &RunAuthzError>,
        relationship: Result<&AuthorizationDecision, &RunAuthzError>,
        authoritative: DecisionSource,
    ) -> Result<AuthorizationDecision, RunAuthzError> {
        let (enforced, record) = Self::evaluate(request, attribute, relationship, authoritative);
        self.events.comparison(record);
        enforced
    }

    /// Pure comparison.
    ///
    /// Agreement is `false` whenever either side failed. The returned result
    /// is exactly the authoritative side's; the other side only feeds the
    /// record.
    #[must_use]
    pub fn evaluate(
        request: &AuthorizationRequest,
        attribute: Result<&AuthorizationDecision, &RunAuthzError>,
        relationship: Result<&AuthorizationDecision, &RunAuthzError>,
        authoritative: DecisionSource,
    ) -> (Result<AuthorizationDecision, RunAuthzError>, ComparisonRecord) {
        let agreement = match (attribute, relationship) {
            (Ok(a), Ok(r)) => a.agrees_with(r),
            _ => false,
        };

        let record = ComparisonRecord {
            subject_id: request.subject_id.clone(),
            tenant_id: request.tenant_id.clone(),
            attribute: attribute.ok().cloned(),
            relationship: relationship.ok().cloned(),
            attribute_error: attribute.err().map(ToString::to_string),
            relationship_error: relationship.err().map(ToString::to_string),
            agreement,
            authoritative,
        };

        let enforced = match authoritative {
            DecisionSource::Attribute => attribute,
            DecisionSource::Relationship => relationship,
        };

        (enforced.cloned().map_err(RunAuthzError::clone), record)
    }
}
