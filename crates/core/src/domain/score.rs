use crate::domain::rating::{ActionType, RatingLevel};

const ACTION_FACTOR: i32 = 3;
const MOVEMENT_FACTOR: i32 = 2;

// score = 3*action + 2*(to - from) + to
//
// The action dominates (an upgrade always outranks a reiteration), rating movement comes
// next, and the destination stance breaks ties between otherwise equal events.
pub fn score(action: ActionType, rating_from: RatingLevel, rating_to: RatingLevel) -> i32 {
    ACTION_FACTOR * action.weight()
        + MOVEMENT_FACTOR * (rating_to.weight() - rating_from.weight())
        + rating_to.weight()
}

/// SQL expression computing [`score`] from the `action`, `rating_from` and `rating_to`
/// columns. Built only from the weight tables above, never from request input.
pub fn score_sql() -> String {
    let action = action_case("action");
    let from = rating_case("rating_from");
    let to = rating_case("rating_to");
    format!("({ACTION_FACTOR} * {action} + {MOVEMENT_FACTOR} * ({to} - {from}) + {to})")
}

fn action_case(column: &str) -> String {
    let arms: String = ActionType::ALL
        .iter()
        .map(|a| format!(" WHEN '{}' THEN {}", a.as_str(), a.weight()))
        .collect();
    format!("(CASE {column}{arms} ELSE 0 END)")
}

fn rating_case(column: &str) -> String {
    let arms: String = RatingLevel::ALL
        .iter()
        .map(|r| format!(" WHEN '{}' THEN {}", r.as_str(), r.weight()))
        .collect();
    format!("(CASE {column}{arms} ELSE 0 END)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_outranks_reiteration() {
        let upgrade = score(ActionType::Up, RatingLevel::Hold, RatingLevel::Buy);
        let reiterated = score(ActionType::Reiterated, RatingLevel::Buy, RatingLevel::Buy);
        let unchanged = score(ActionType::Reiterated, RatingLevel::Hold, RatingLevel::Hold);
        assert_eq!(upgrade, 6);
        assert_eq!(reiterated, 1);
        assert_eq!(unchanged, 0);
        assert!(upgrade > reiterated && reiterated > unchanged);
    }

    #[test]
    fn downgrade_is_lowest() {
        let down = score(ActionType::Down, RatingLevel::Buy, RatingLevel::Sell);
        assert_eq!(down, -8);
        for action in ActionType::ALL {
            for from in RatingLevel::ALL {
                for to in RatingLevel::ALL {
                    assert!(score(action, from, to) >= down);
                }
            }
        }
    }

    #[test]
    fn target_raise_without_rating_change_beats_lowered_target() {
        let raised = score(ActionType::Up, RatingLevel::Hold, RatingLevel::Hold);
        let lowered = score(ActionType::Down, RatingLevel::Hold, RatingLevel::Hold);
        assert!(raised > lowered);
    }

    #[test]
    fn sql_expression_covers_every_variant() {
        let sql = score_sql();
        for a in ActionType::ALL {
            assert!(sql.contains(&format!("'{}'", a.as_str())));
        }
        for r in RatingLevel::ALL {
            assert!(sql.contains(&format!("'{}'", r.as_str())));
        }
        assert!(sql.starts_with("(3 * (CASE action"));
    }
}
