//! Cycle visits: the periodic inspection a Chef de Parc records against an
//! OI, independent of operating hours.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  oi::Oi,
  user::{Role, User},
};

/// The outcome of one cycle visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleVisit {
  pub accepted:     bool,
  /// The day the visit was carried out.
  pub performed_on: NaiveDate,
  /// When the next visit is due.
  pub next_visit:   NaiveDate,
}

impl CycleVisit {
  /// A visit cannot be recorded ahead of time, and the next one cannot be
  /// scheduled in the past.
  pub fn validate(&self, today: NaiveDate) -> Result<()> {
    if self.performed_on > today {
      return Err(Error::VisitInFuture(self.performed_on));
    }
    if self.next_visit < today {
      return Err(Error::NextVisitInPast(self.next_visit));
    }
    Ok(())
  }

  /// Copy the visit onto the OI's visit fields.
  pub fn apply_to(&self, oi: &mut Oi) {
    oi.last_visit_accepted = Some(self.accepted);
    oi.last_cycle_visit = Some(self.performed_on);
    oi.next_cycle_visit = Some(self.next_visit);
  }
}

/// Only an active Chef de Parc records cycle visits.
pub fn check_recorder(actor: &User) -> Result<()> {
  if !actor.active {
    return Err(Error::InactiveUser(actor.user_id));
  }
  if actor.role != Role::ChefDeParc {
    return Err(Error::Forbidden(format!(
      "{} cannot record cycle visits",
      actor.username
    )));
  }
  Ok(())
}

pub fn cycle_visit_message(oi: &Oi, visit: &CycleVisit, chef: &User) -> String {
  let result = if visit.accepted { "acceptée" } else { "échouée" };
  format!(
    "La visite de cycle pour l'OI '{}' a été enregistrée comme {} par {}. Prochaine visite le {}.",
    oi.value,
    result,
    chef.name,
    visit.next_visit.format("%Y-%m-%d")
  )
}
