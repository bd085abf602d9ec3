use chrono::{Duration, Utc};
use rand::{seq::IteratorRandom, Rng};
use threadline_api::{CommentId, Node, Time, UserId};
use uuid::Uuid;

const NUM_USERS: usize = 8;

const NUM_COMMENTS: usize = 20;
const MAX_REPLIES: usize = 12;
const MAX_SUB_REPLIES: usize = 3;

const MAX_TEXT_WORDS: usize = 40;
const MAX_AGE_MINUTES: i64 = 60 * 24 * 30;

fn gen_node(rng: &mut impl Rng, users: &[UserId], created_at: Time) -> Node {
    let author_id = users[rng.gen_range(0..users.len())];
    let num_likes = rng.gen_range(0..=users.len());
    let edited_at = match rng.gen_bool(0.2) {
        true => Some(created_at + Duration::minutes(rng.gen_range(1..60))),
        false => None,
    };
    Node {
        id: CommentId::new(),
        text: lipsum::lipsum_words(rng.gen_range(1..=MAX_TEXT_WORDS)),
        author_id,
        created_at,
        edited_at,
        likes: users.iter().copied().choose_multiple(rng, num_likes),
        children: Vec::new(),
    }
}

/// `n` dates after `since`, oldest first
fn gen_dates(rng: &mut impl Rng, since: Time, n: usize) -> Vec<Time> {
    let mut res = (0..n)
        .map(|_| since + Duration::minutes(rng.gen_range(1..MAX_AGE_MINUTES)))
        .collect::<Vec<_>>();
    res.sort();
    res
}

fn main() -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    let users = (0..NUM_USERS)
        .map(|_| UserId(Uuid::new_v4()))
        .collect::<Vec<_>>();
    let start = Utc::now() - Duration::minutes(3 * MAX_AGE_MINUTES);

    let mut comments = Vec::new();
    for date in gen_dates(&mut rng, start, NUM_COMMENTS) {
        let mut comment = gen_node(&mut rng, &users, date);
        let num_replies = rng.gen_range(0..=MAX_REPLIES);
        for date in gen_dates(&mut rng, date, num_replies) {
            let mut reply = gen_node(&mut rng, &users, date);
            let num_sub_replies = rng.gen_range(0..=MAX_SUB_REPLIES);
            for date in gen_dates(&mut rng, date, num_sub_replies) {
                reply.children.push(gen_node(&mut rng, &users, date));
            }
            comment.children.push(reply);
        }
        comments.push(comment);
    }
    // newest comments come first
    comments.reverse();

    println!("{}", serde_json::to_string_pretty(&comments)?);
    Ok(())
}
