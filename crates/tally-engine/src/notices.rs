//! Warnings for edits and deletions, the online announcement, and plain-text
//! rendering of every [`Notice`].

use std::fmt;

use tally_schemas::{MemberId, MessageId, SequenceState};

use crate::{BreakKind, Notice};

/// Warning for a deleted message, if it was (or had been) a counting attempt.
///
/// `bot_reacted` covers a message edited into non-candidate text before
/// deletion: a reaction from us proves it was a move at some point.
pub fn deletion_notice(
    state: &SequenceState,
    member_id: MemberId,
    text: &str,
    bot_reacted: bool,
) -> Option<Notice> {
    if !tally_expr::is_candidate(text) && !bot_reacted {
        return None;
    }
    Some(Notice::NumberDeleted {
        member_id,
        next_expected: state.next_expected(),
    })
}

/// Warning for an edited message when either side is a counting attempt.
pub fn edit_notice(
    state: &SequenceState,
    member_id: MemberId,
    message_id: MessageId,
    before: &str,
    after: &str,
) -> Option<Notice> {
    if before == after {
        return None;
    }
    if !tally_expr::is_candidate(before) && !tally_expr::is_candidate(after) {
        return None;
    }
    Some(Notice::NumberEdited {
        member_id,
        message_id,
        next_expected: state.next_expected(),
    })
}

pub fn online_notice(state: &SequenceState) -> Notice {
    Notice::Online {
        current_count: state.current_count,
        high_score: state.high_score,
        last_member_id: state.current_member_id,
    }
}

const POLICY: &str = "Please note that editing or deleting numbers is prohibited, \
                      even if it has messed up the count.";

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::CountBroken {
                member_id,
                kind,
                high_score,
            } => {
                write!(f, "<@{member_id}> messed up the count! ")?;
                match kind {
                    BreakKind::RepeatedMember => {
                        write!(f, "You cannot count two numbers in a row!")?
                    }
                    BreakKind::WrongNumber { expected, .. } => {
                        write!(f, "The correct number was {expected}.")?
                    }
                    BreakKind::DivisionByZero => write!(f, "Division by zero is not a number!")?,
                }
                write!(
                    f,
                    "\nRestart from **1** and try to beat the current high score of **{high_score}**!"
                )
            }
            Notice::SyntaxError { detail, .. } => write!(
                f,
                "Syntax error in mathematical expression ({detail})!\nThe chain has **not** been broken."
            ),
            Notice::NumberDeleted {
                member_id,
                next_expected,
            } => write!(
                f,
                "<@{member_id}> deleted their number!\n{POLICY}\n\nThe **NEXT** number is **{next_expected}**."
            ),
            Notice::NumberEdited {
                member_id,
                next_expected,
                ..
            } => write!(
                f,
                "<@{member_id}> edited their number!\n{POLICY}\n\nThe **NEXT** number is **{next_expected}**."
            ),
            Notice::Online {
                current_count,
                high_score,
                last_member_id,
            } => {
                write!(f, "I'm now online! Current number: {current_count}.")?;
                if let Some(m) = last_member_id {
                    write!(f, " Last input by <@{m}>.")?;
                }
                if *high_score > 0 {
                    write!(f, " Let's beat the high score of {high_score}!")?;
                }
                Ok(())
            }
        }
    }
}
