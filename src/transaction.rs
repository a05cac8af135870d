//! Income and expense records.

use std::{fmt::Display, str::FromStr};

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    DatabaseId, Error,
    auth::UserID,
    db::in_transaction,
    family::FamilyId,
    gateway::{CopyMap, EntityKind, GatewayState, ScopedEntity, query, remap},
    scope::{RequestScope, resolve_request},
};

/// Whether money was earned or spent.
///
/// Categories carry the same distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(EntryType::Income),
            "expense" => Ok(EntryType::Expense),
            other => Err(format!("unknown entry type {other:?}")),
        }
    }
}

impl ToSql for EntryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EntryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// How a transaction was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Upi,
    Neft,
    Imps,
    Rtgs,
    Cheque,
    Other,
}

impl PaymentMethod {
    const ALL: [PaymentMethod; 9] = [
        PaymentMethod::Cash,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Upi,
        PaymentMethod::Neft,
        PaymentMethod::Imps,
        PaymentMethod::Rtgs,
        PaymentMethod::Cheque,
        PaymentMethod::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Neft => "neft",
            PaymentMethod::Imps => "imps",
            PaymentMethod::Rtgs => "rtgs",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
        }
    }
}

impl ToSql for PaymentMethod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PaymentMethod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;

        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown payment method {text:?}").into()))
    }
}

/// The client-writable part of a [Transaction].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFields {
    /// The amount of money, always positive. [TransactionFields::transaction_type]
    /// says which way it moved.
    pub amount: f64,
    pub transaction_type: EntryType,
    pub payment_method: PaymentMethod,
    /// When the transaction happened.
    pub date: Date,
    #[serde(default)]
    pub payee: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// The category in the same scope, if any.
    #[serde(default)]
    pub category_id: Option<DatabaseId>,
    /// The credit source in the same scope that paid for the transaction, if any.
    #[serde(default)]
    pub credit_source_id: Option<DatabaseId>,
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: DatabaseId,
    /// The user who created the transaction.
    pub owner_id: UserID,
    /// The family the transaction belongs to, `None` for Personal.
    pub family_id: Option<FamilyId>,
    #[serde(flatten)]
    pub fields: TransactionFields,
}

impl ScopedEntity for Transaction {
    type Fields = TransactionFields;

    const KIND: EntityKind = EntityKind::Transaction;

    const FIELD_COLUMNS: &'static [&'static str] = &[
        "amount",
        "transaction_type",
        "payment_method",
        "date",
        "payee",
        "notes",
        "category_id",
        "credit_source_id",
    ];

    const ORDER_BY: &'static str = "date DESC, id DESC";

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
        Ok(TransactionFields {
            amount: row.get(offset)?,
            transaction_type: row.get(offset + 1)?,
            payment_method: row.get(offset + 2)?,
            date: row.get(offset + 3)?,
            payee: row.get(offset + 4)?,
            notes: row.get(offset + 5)?,
            category_id: row.get(offset + 6)?,
            credit_source_id: row.get(offset + 7)?,
        })
    }

    fn field_values(fields: &Self::Fields) -> Vec<&dyn ToSql> {
        vec![
            &fields.amount,
            &fields.transaction_type,
            &fields.payment_method,
            &fields.date,
            &fields.payee,
            &fields.notes,
            &fields.category_id,
            &fields.credit_source_id,
        ]
    }

    fn validate(fields: &Self::Fields) -> Result<(), String> {
        if !fields.amount.is_finite() || fields.amount <= 0.0 {
            return Err(format!("amount must be greater than zero, got {}", fields.amount));
        }

        Ok(())
    }

    fn references(fields: &Self::Fields) -> Vec<(EntityKind, DatabaseId)> {
        let mut references = Vec::new();

        if let Some(category_id) = fields.category_id {
            references.push((EntityKind::Category, category_id));
        }

        if let Some(credit_source_id) = fields.credit_source_id {
            references.push((EntityKind::CreditSource, credit_source_id));
        }

        references
    }

    fn remap_references(fields: &mut Self::Fields, copies: &CopyMap) {
        fields.category_id = remap(fields.category_id, EntityKind::Category, copies);
        fields.credit_source_id = remap(fields.credit_source_id, EntityKind::CreditSource, copies);
    }

    fn in_date_range(fields: &Self::Fields, from: Option<Date>, to: Option<Date>) -> bool {
        from.is_none_or(|from| fields.date >= from) && to.is_none_or(|to| fields.date <= to)
    }
}

/// The optional date range of a summary, both ends inclusive.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryRange {
    pub from: Option<Date>,
    pub to: Option<Date>,
}

/// Income and expense totals over the transactions of a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    /// Income minus expenses, negative when more was spent than earned.
    pub net_savings: f64,
    pub income_count: usize,
    pub expense_count: usize,
    pub total_transactions: usize,
}

impl TransactionSummary {
    fn add(&mut self, fields: &TransactionFields) {
        match fields.transaction_type {
            EntryType::Income => {
                self.total_income += fields.amount;
                self.income_count += 1;
            }
            EntryType::Expense => {
                self.total_expenses += fields.amount;
                self.expense_count += 1;
            }
        }

        self.net_savings = self.total_income - self.total_expenses;
        self.total_transactions += 1;
    }
}

/// Total the transactions in `scope` that fall within `range`.
///
/// # Errors
/// Returns an error if the transactions could not be read.
pub fn summarize_transactions(
    range: &SummaryRange,
    scope: &RequestScope,
    connection: &Connection,
) -> Result<TransactionSummary, Error> {
    let transactions = query::list::<Transaction>(scope, connection)?;

    let summary = transactions
        .iter()
        .filter(|transaction| {
            Transaction::in_date_range(&transaction.fields, range.from, range.to)
        })
        .fold(TransactionSummary::default(), |mut summary, transaction| {
            summary.add(&transaction.fields);
            summary
        });

    Ok(summary)
}

/// Get the income and expense totals of the caller's active scope.
pub async fn get_transaction_summary_endpoint(
    State(state): State<GatewayState>,
    Extension(user_id): Extension<UserID>,
    Query(range): Query<SummaryRange>,
) -> Response {
    in_transaction(&state.db_connection, |transaction| {
        let scope = resolve_request(user_id, transaction)?;
        summarize_transactions(&range, &scope, transaction)
    })
    .map(Json)
    .into_response()
}

/// Create the transaction table.
///
/// # Errors
/// Returns an error if the table could not be created.
pub fn create_transaction_table(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                family_id INTEGER,
                amount REAL NOT NULL,
                transaction_type TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                date TEXT NOT NULL,
                payee TEXT,
                notes TEXT,
                category_id INTEGER,
                credit_source_id INTEGER,
                FOREIGN KEY(owner_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
                FOREIGN KEY(family_id) REFERENCES family(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(credit_source_id) REFERENCES credit_source(id) ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_scope ON \"transaction\"(family_id, owner_id)",
        (),
    )?;

    Ok(())
}
