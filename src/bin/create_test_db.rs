use std::{error::Error, path::Path, process::exit};

use clap::Parser;
use rusqlite::Connection;

use ledger_rs::{
    FamilyName, PasswordHash, Role, ValidatedPassword, add_member, create_user, initialize_db,
    insert_family,
};

/// A utility for creating a test database for the REST API server of ledger_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// Two users are created with the password "test". Alice has Personal
/// records and is the admin of a family that Bob is a member of.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    if output_path
        .extension()
        .is_none_or(|extension| extension.is_empty())
    {
        eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
        exit(1);
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let mut connection = Connection::open(output_path)?;
    initialize_db(&connection)?;

    let transaction = connection.transaction()?;

    println!("Creating test users...");
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;
    let alice = create_user("alice@example.com", password_hash.clone(), &transaction)?;
    let bob = create_user("bob@example.com", password_hash, &transaction)?;

    println!("Creating test family...");
    let family = insert_family(FamilyName::new("Test Family")?, alice.id, &transaction)?;
    add_member(family.id, alice.id, Role::Admin, &transaction)?;
    add_member(family.id, bob.id, Role::Member, &transaction)?;

    println!("Creating sample records...");
    for (family_id, category_name, payee) in [
        (None, "Groceries", "Corner Store"),
        (Some(family.id), "Household", "Power Company"),
    ] {
        transaction.execute(
            "INSERT INTO category (owner_id, family_id, name, category_type)
            VALUES (?1, ?2, ?3, 'expense')",
            (alice.id, family_id, category_name),
        )?;
        let category_id = transaction.last_insert_rowid();

        transaction.execute(
            "INSERT INTO \"transaction\"
            (owner_id, family_id, amount, transaction_type, payment_method, date, payee, category_id)
            VALUES (?1, ?2, 42.5, 'expense', 'upi', date('now'), ?3, ?4)",
            (alice.id, family_id, payee, category_id),
        )?;
    }

    transaction.execute(
        "INSERT INTO budget
        (owner_id, family_id, name, period_start, period_end, total, alert_threshold_percent)
        VALUES (?1, ?2, 'Monthly', date('now', 'start of month'),
            date('now', 'start of month', '+1 month', '-1 day'), 1500.0, 80)",
        (alice.id, family.id),
    )?;

    transaction.execute(
        "INSERT INTO credit_source
        (owner_id, family_id, card_name, card_last4, credit_limit, billing_day, due_day)
        VALUES (?1, NULL, 'Everyday Card', '4242', 5000.0, 5, 25)",
        (alice.id,),
    )?;

    transaction.commit()?;

    println!("Success!");

    Ok(())
}
