//! Spending budgets over a period of days.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    DatabaseId, Error,
    auth::UserID,
    db::in_transaction,
    family::FamilyId,
    gateway::{EntityKind, GatewayState, ScopedEntity, query},
    scope::{RequestScope, resolve_request},
    timezone::get_local_offset,
};

/// The client-writable part of a [Budget].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetFields {
    pub name: String,
    /// The first day of the budget, inclusive.
    pub period_start: Date,
    /// The last day of the budget, inclusive.
    pub period_end: Date,
    /// The amount that may be spent over the period.
    pub total: f64,
    /// The percentage of [BudgetFields::total] at which the user should be warned.
    pub alert_threshold_percent: u8,
}

impl BudgetFields {
    /// Whether `date` falls within the budget's period.
    pub fn covers(&self, date: Date) -> bool {
        self.period_start <= date && date <= self.period_end
    }
}

/// A limit on spending over a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub id: DatabaseId,
    pub owner_id: UserID,
    pub family_id: Option<FamilyId>,
    #[serde(flatten)]
    pub fields: BudgetFields,
}

impl ScopedEntity for Budget {
    type Fields = BudgetFields;

    const KIND: EntityKind = EntityKind::Budget;

    const FIELD_COLUMNS: &'static [&'static str] = &[
        "name",
        "period_start",
        "period_end",
        "total",
        "alert_threshold_percent",
    ];

    const ORDER_BY: &'static str = "period_start DESC, id DESC";

    fn from_parts(
        id: DatabaseId,
        owner_id: UserID,
        family_id: Option<FamilyId>,
        fields: Self::Fields,
    ) -> Self {
        Self {
            id,
            owner_id,
            family_id,
            fields,
        }
    }

    fn id(&self) -> DatabaseId {
        self.id
    }

    fn owner(&self) -> UserID {
        self.owner_id
    }

    fn family_id(&self) -> Option<FamilyId> {
        self.family_id
    }

    fn set_family_id(&mut self, family_id: Option<FamilyId>) {
        self.family_id = family_id;
    }

    fn fields(&self) -> &Self::Fields {
        &self.fields
    }

    fn map_fields(row: &Row, offset: usize) -> Result<Self::Fields, rusqlite::Error> {
        Ok(BudgetFields {
            name: row.get(offset)?,
            period_start: row.get(offset + 1)?,
            period_end: row.get(offset + 2)?,
            total: row.get(offset + 3)?,
            alert_threshold_percent: row.get(offset + 4)?,
        })
    }

    fn field_values(fields: &Self::Fields) -> Vec<&dyn ToSql> {
        vec![
            &fields.name,
            &fields.period_start,
            &fields.period_end,
            &fields.total,
            &fields.alert_threshold_percent,
        ]
    }

    fn validate(fields: &Self::Fields) -> Result<(), String> {
        if fields.name.trim().is_empty() {
            return Err("name cannot be empty".to_owned());
        }

        if fields.period_end <= fields.period_start {
            return Err("period must end after it starts".to_owned());
        }

        if !fields.total.is_finite() || fields.total <= 0.0 {
            return Err(format!("total must be greater than zero, got {}", fields.total));
        }

        if !(1..=100).contains(&fields.alert_threshold_percent) {
            return Err(format!(
                "alert threshold must be between 1 and 100 percent, got {}",
                fields.alert_threshold_percent
            ));
        }

        Ok(())
    }
}

/// The budgets in `scope` whose period contains `date`, newest period first.
///
/// # Errors
/// Returns an error if the budgets could not be read.
pub fn active_budgets(
    date: Date,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<Vec<Budget>, Error> {
    let budgets = query::list::<Budget>(scope, connection)?;

    Ok(budgets
        .into_iter()
        .filter(|budget| budget.fields.covers(date))
        .collect())
}

/// List the budgets of the caller's active scope that are running today.
pub async fn get_active_budgets_endpoint(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezone(state.local_timezone).into_response();
    };
    let today = OffsetDateTime::now_utc().to_offset(local_offset).date();

    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        active_budgets(today, &scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Create the budget table.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_budget_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                family_id INTEGER,
                name TEXT NOT NULL,
                period_start TEXT NOT NULL,
                period_end TEXT NOT NULL,
                total REAL NOT NULL,
                alert_threshold_percent INTEGER NOT NULL,
                FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_scope ON budget(family_id, owner_id)",
        (),
    )?;

    Ok(())
}
