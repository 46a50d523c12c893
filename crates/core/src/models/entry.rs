use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Common shape of the flat, dated, monetary entries kept by the
/// expense and income ledgers.
pub trait LedgerEntry: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Caller input without an identifier.
    type Draft: Send;

    /// Storage key of the ledger holding this entry kind.
    const STORAGE_KEY: &'static str;

    fn from_draft(id: Uuid, draft: Self::Draft) -> Self;

    /// Amount carried by a draft, checked before insertion.
    fn draft_amount(draft: &Self::Draft) -> f64;

    fn id(&self) -> Uuid;
    fn amount(&self) -> f64;
    fn date(&self) -> NaiveDate;
}

// ── Expenses ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub amount: f64,
    /// Free-text category (e.g., "Groceries")
    pub category: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub title: String,
    pub amount: f64,
    pub category: String,
    pub date: NaiveDate,
}

impl NewExpense {
    pub fn new(
        title: impl Into<String>,
        amount: f64,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            title: title.into(),
            amount,
            category: category.into(),
            date,
        }
    }
}

impl LedgerEntry for Expense {
    type Draft = NewExpense;
    const STORAGE_KEY: &'static str = "expenses";

    fn from_draft(id: Uuid, draft: NewExpense) -> Self {
        Self {
            id,
            title: draft.title,
            amount: draft.amount,
            category: draft.category,
            date: draft.date,
        }
    }

    fn draft_amount(draft: &NewExpense) -> f64 {
        draft.amount
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

// ── Income ──────────────────────────────────────────────────────────

/// Closed set of income categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeCategory {
    Salary,
    Freelance,
    Investment,
    Gift,
    Other,
}

impl std::fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncomeCategory::Salary => write!(f, "Salary"),
            IncomeCategory::Freelance => write!(f, "Freelance"),
            IncomeCategory::Investment => write!(f, "Investment"),
            IncomeCategory::Gift => write!(f, "Gift"),
            IncomeCategory::Other => write!(f, "Other"),
        }
    }
}

impl std::str::FromStr for IncomeCategory {
    type Err = crate::errors::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "salary" => Ok(IncomeCategory::Salary),
            "freelance" => Ok(IncomeCategory::Freelance),
            "investment" => Ok(IncomeCategory::Investment),
            "gift" => Ok(IncomeCategory::Gift),
            "other" => Ok(IncomeCategory::Other),
            _ => Err(crate::errors::CoreError::ValidationError(format!(
                "Unknown income category '{s}': expected Salary, Freelance, Investment, Gift or Other"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: Uuid,
    pub title: String,
    pub amount: f64,
    pub category: IncomeCategory,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIncome {
    pub title: String,
    pub amount: f64,
    pub category: IncomeCategory,
    pub date: NaiveDate,
}

impl NewIncome {
    pub fn new(title: impl Into<String>, amount: f64, category: IncomeCategory, date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            amount,
            category,
            date,
        }
    }
}

impl LedgerEntry for Income {
    type Draft = NewIncome;
    const STORAGE_KEY: &'static str = "income";

    fn from_draft(id: Uuid, draft: NewIncome) -> Self {
        Self {
            id,
            title: draft.title,
            amount: draft.amount,
            category: draft.category,
            date: draft.date,
        }
    }

    fn draft_amount(draft: &NewIncome) -> f64 {
        draft.amount
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}
