//! CSV event feed for the CLI driver.
//!
//! Each row is one loyalty event. Malformed rows are per-row typed errors so
//! the feed can warn and continue; they never abort the run.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LoyaltySnapshot;
use crate::model::{MerchantId, RedemptionId, UserId};
use crate::program::ProgramConfig;
use crate::{Amount, Command};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized op '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    merchant: Option<MerchantId>,
    user: Option<UserId>,
    amount: Option<f64>,
    points: Option<i64>,
    discounted: Option<bool>,
    redemption: Option<RedemptionId>,
    reason: Option<String>,
    order: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    user: UserId,
    merchant: MerchantId,
    balance: i64,
    lifetime_earned: i64,
    lifetime_redeemed: i64,
    tier: String,
}

fn require<T>(value: Option<T>, line: usize, op: &str, field: &'static str) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        op: op.to_string(),
        field,
    })
}

/// Read loyalty commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let op = row.op.as_str();
            match op {
                "program" => Ok(Command::InitProgram {
                    merchant: require(row.merchant, line, op, "merchant")?,
                    config: ProgramConfig::default(),
                }),
                "earn" => Ok(Command::Earn {
                    user: require(row.user, line, op, "user")?,
                    merchant: require(row.merchant, line, op, "merchant")?,
                    amount: Amount::from_float(require(row.amount, line, op, "amount")?),
                    discounted: row.discounted.unwrap_or(false),
                    order_id: row.order,
                }),
                "redeem" => Ok(Command::Redeem {
                    user: require(row.user, line, op, "user")?,
                    merchant: require(row.merchant, line, op, "merchant")?,
                    points: require(row.points, line, op, "points")?,
                }),
                "cancel" => Ok(Command::Cancel {
                    redemption: require(row.redemption, line, op, "redemption")?,
                    reason: row.reason.unwrap_or_default(),
                }),
                "adjust" => Ok(Command::Adjust {
                    merchant: require(row.merchant, line, op, "merchant")?,
                    user: require(row.user, line, op, "user")?,
                    points: require(row.points, line, op, "points")?,
                    reason: row.reason.unwrap_or_default(),
                }),
                "expire" => Ok(Command::Expire {
                    user: require(row.user, line, op, "user")?,
                    merchant: require(row.merchant, line, op, "merchant")?,
                }),
                other => Err(CsvError::UnrecognizedOp {
                    line,
                    op: other.to_string(),
                }),
            }
        })
}

/// Write balance snapshots to stdout in csv format, ordered by
/// (merchant, user) for stable output.
pub fn write_snapshots(snapshots: impl IntoIterator<Item = LoyaltySnapshot>) {
    let mut snapshots: Vec<LoyaltySnapshot> = snapshots.into_iter().collect();
    snapshots.sort_by_key(|s| (s.merchant_id, s.user_id));

    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for snapshot in snapshots {
        let row = OutputRow {
            user: snapshot.user_id,
            merchant: snapshot.merchant_id,
            balance: snapshot.current_balance,
            lifetime_earned: snapshot.lifetime_earned,
            lifetime_redeemed: snapshot.lifetime_redeemed,
            tier: snapshot.tier().to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,merchant,user,amount,points,discounted,redemption,reason,order\n";

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn read_program_row() {
        let file = write_csv(&format!("{HEADER}program,1,,,,,,,\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);

        let cmd = results.into_iter().next().unwrap().unwrap();
        match cmd {
            Command::InitProgram { merchant, .. } => assert_eq!(merchant, 1),
            _ => panic!("expected program command"),
        }
    }

    #[test]
    fn read_earn_row() {
        let file = write_csv(&format!("{HEADER}earn,1,7,10.5,,true,,,ord-3\n"));
        let cmd = read_commands(file.path()).next().unwrap().unwrap();
        match cmd {
            Command::Earn {
                user,
                merchant,
                amount,
                discounted,
                order_id,
            } => {
                assert_eq!(user, 7);
                assert_eq!(merchant, 1);
                assert_eq!(amount, Amount::from_float(10.5));
                assert!(discounted);
                assert_eq!(order_id.as_deref(), Some("ord-3"));
            }
            _ => panic!("expected earn command"),
        }
    }

    #[test]
    fn read_redeem_and_cancel_rows() {
        let file = write_csv(&format!(
            "{HEADER}redeem,1,7,,120,,,,\ncancel,,,,,,3,out of stock,\n"
        ));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 2);

        match results[0].as_ref().unwrap() {
            Command::Redeem {
                user,
                merchant,
                points,
            } => {
                assert_eq!((*user, *merchant, *points), (7, 1, 120));
            }
            other => panic!("expected redeem, got {other:?}"),
        }
        match results[1].as_ref().unwrap() {
            Command::Cancel { redemption, reason } => {
                assert_eq!(*redemption, 3);
                assert_eq!(reason, "out of stock");
            }
            other => panic!("expected cancel, got {other:?}"),
        }
    }

    #[test]
    fn read_adjust_and_expire_rows() {
        let file = write_csv(&format!(
            "{HEADER}adjust,1,7,,-50,,,inventory correction,\nexpire,1,7,,,,,,\n"
        ));
        let results: Vec<_> = read_commands(file.path()).collect();

        match results[0].as_ref().unwrap() {
            Command::Adjust { points, reason, .. } => {
                assert_eq!(*points, -50);
                assert_eq!(reason, "inventory correction");
            }
            other => panic!("expected adjust, got {other:?}"),
        }
        assert!(matches!(
            results[1].as_ref().unwrap(),
            Command::Expire {
                user: 7,
                merchant: 1
            }
        ));
    }

    #[test]
    fn read_with_whitespace() {
        let file = write_csv(&format!("{HEADER}earn, 1, 7, 10.0,,,,,\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[test]
    fn read_returns_error_for_unknown_op() {
        let file = write_csv(&format!("{HEADER}teleport,1,7,,,,,,\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedOp { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_field() {
        let file = write_csv(&format!("{HEADER}redeem,1,7,,,,,,\n"));
        let results: Vec<_> = read_commands(file.path()).collect();
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "points",
                ..
            }
        ));
    }
}
