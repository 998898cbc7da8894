use crate::session::question::AnswerOption;
use crate::session::quiz::QuizState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizCommand {
    Answer(AnswerOption),
    Next,
    Previous,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    Answered { correct: bool },
    AlreadyAnswered,
    Moved,
    Finished,
    TimedOut,
}

/// Single-key command: an answer letter, `n`ext, `p`revious or `q`uit.
pub fn command_for_char(ch: char) -> Option<QuizCommand> {
    match ch.to_ascii_lowercase() {
        'n' => Some(QuizCommand::Next),
        'p' => Some(QuizCommand::Previous),
        'q' => Some(QuizCommand::Quit),
        _ => AnswerOption::from_char(ch).map(QuizCommand::Answer),
    }
}

/// Clock tick while the quiz is on screen. Completes the quiz once the time
/// limit has passed, whether or not any key was pressed.
pub fn process_tick(quiz: &mut QuizState) -> Option<InputOutcome> {
    if quiz.is_complete() {
        return None;
    }
    quiz.check_timeout().then_some(InputOutcome::TimedOut)
}

/// Apply a command to a running quiz. The time limit is checked first, so a
/// command arriving after it has passed only completes the quiz.
pub fn process_command(quiz: &mut QuizState, command: QuizCommand) -> InputOutcome {
    if quiz.check_timeout() {
        return InputOutcome::TimedOut;
    }
    match command {
        QuizCommand::Answer(option) => match quiz.answer(option) {
            Some(correct) => InputOutcome::Answered { correct },
            None => InputOutcome::AlreadyAnswered,
        },
        QuizCommand::Next => {
            quiz.next();
            if quiz.is_complete() {
                InputOutcome::Finished
            } else {
                InputOutcome::Moved
            }
        }
        QuizCommand::Previous => {
            quiz.previous();
            InputOutcome::Moved
        }
        QuizCommand::Quit => {
            quiz.finish();
            InputOutcome::Finished
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::assessment::AssessmentType;
    use crate::session::question::QuestionBank;
    use std::time::{Duration, Instant};

    fn running_quiz(seconds_per_question: u32) -> QuizState {
        let bank = QuestionBank::bundled().unwrap();
        let mut quiz = QuizState::new(
            AssessmentType::Checkpoint,
            bank.for_assessment(AssessmentType::Checkpoint),
            seconds_per_question,
        );
        quiz.start();
        quiz
    }

    #[test]
    fn test_command_for_char() {
        assert_eq!(command_for_char('b'), Some(QuizCommand::Answer(AnswerOption::B)));
        assert_eq!(command_for_char('D'), Some(QuizCommand::Answer(AnswerOption::D)));
        assert_eq!(command_for_char('n'), Some(QuizCommand::Next));
        assert_eq!(command_for_char('P'), Some(QuizCommand::Previous));
        assert_eq!(command_for_char('q'), Some(QuizCommand::Quit));
        assert_eq!(command_for_char('e'), None);
        assert_eq!(command_for_char(' '), None);
    }

    #[test]
    fn test_answer_is_locked() {
        let mut quiz = running_quiz(90);
        let first = process_command(&mut quiz, QuizCommand::Answer(AnswerOption::A));
        assert!(matches!(first, InputOutcome::Answered { .. }));
        assert_eq!(
            process_command(&mut quiz, QuizCommand::Answer(AnswerOption::B)),
            InputOutcome::AlreadyAnswered
        );
        assert_eq!(quiz.current_answer(), Some(AnswerOption::A));
    }

    #[test]
    fn test_next_past_last_finishes() {
        let mut quiz = running_quiz(90);
        let total = quiz.questions.len();
        for _ in 1..total {
            assert_eq!(process_command(&mut quiz, QuizCommand::Next), InputOutcome::Moved);
        }
        assert_eq!(process_command(&mut quiz, QuizCommand::Next), InputOutcome::Finished);
        assert!(quiz.is_complete());
    }

    #[test]
    fn test_expired_quiz_times_out() {
        let mut quiz = running_quiz(0);
        assert_eq!(
            process_command(&mut quiz, QuizCommand::Answer(AnswerOption::A)),
            InputOutcome::TimedOut
        );
        assert!(quiz.timed_out);
        assert_eq!(quiz.answered_count(), 0);
    }

    #[test]
    fn test_tick_ends_overdue_quiz_without_input() {
        let mut quiz = running_quiz(1);
        assert_eq!(process_tick(&mut quiz), None);
        assert!(!quiz.is_complete());

        quiz.started_at = Instant::now().checked_sub(quiz.time_limit + Duration::from_secs(3));
        assert_eq!(process_tick(&mut quiz), Some(InputOutcome::TimedOut));
        assert!(quiz.is_complete());
        assert_eq!(quiz.elapsed(), quiz.time_limit);
        assert_eq!(process_tick(&mut quiz), None);
    }
}
