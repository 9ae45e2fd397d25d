use super::*;

#[test]
fn sheet_flow_walks_the_happy_path() {
    let mut t = JobTrace::new();
    for s in [
        JobState::GridResolved,
        JobState::Sliced,
        JobState::Dispatched,
        JobState::Assembled,
        JobState::Completed,
    ] {
        t.advance(s).unwrap();
    }
    assert_eq!(t.current(), JobState::Completed);
    assert_eq!(t.states().len(), 6);
}

#[test]
fn video_flows_pass_through_sampling() {
    let mut gif = JobTrace::new();
    gif.advance(JobState::Sampled).unwrap();
    gif.advance(JobState::Encoded).unwrap();
    gif.advance(JobState::Completed).unwrap();

    let mut sheet = JobTrace::new();
    sheet.advance(JobState::Sampled).unwrap();
    sheet.advance(JobState::GridResolved).unwrap();
    sheet.advance(JobState::Assembled).unwrap();
    sheet.advance(JobState::Completed).unwrap();
}

#[test]
fn illegal_transitions_are_rejected() {
    let mut t = JobTrace::new();
    assert!(t.advance(JobState::Dispatched).is_err());
    assert!(t.advance(JobState::Completed).is_err());
    assert_eq!(t.current(), JobState::Received);

    t.advance(JobState::GridResolved).unwrap();
    assert!(t.advance(JobState::Received).is_err());
}

#[test]
fn failure_is_reachable_until_terminal() {
    let mut t = JobTrace::new();
    t.advance(JobState::GridResolved).unwrap();
    t.fail();
    assert_eq!(t.current(), JobState::Failed);
    assert!(t.advance(JobState::Sliced).is_err());
    t.fail();
    assert_eq!(t.states().len(), 3);
    assert!(!JobState::Completed.can_advance_to(JobState::Failed));
}
