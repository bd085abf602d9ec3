use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context;
use threadline_client::{
    api::{self, UserId, Uuid},
    CommentStore, Node, NodePath, ReplyDisclosure,
};

#[derive(structopt::StructOpt)]
struct Opt {
    /// JSON dump of a discussion tree, as returned by the server
    #[structopt(short, long)]
    file: PathBuf,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Print the tree, revealing replies page by page like a client would
    Show {
        /// Number of reply pages to reveal under each comment
        #[structopt(short, long, default_value = "1")]
        pages: usize,
    },

    /// Print the number of nodes at each depth
    Count,

    /// List the nodes liked by the user set in THREADLINE_USER
    Liked,
}

fn acting_user() -> anyhow::Result<UserId> {
    let user = std::env::var("THREADLINE_USER")
        .context("retrieving THREADLINE_USER environment variable")?;
    let user = Uuid::try_parse(&user).context("parsing THREADLINE_USER as a user id")?;
    Ok(UserId(user))
}

fn load(file: &Path) -> anyhow::Result<CommentStore> {
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );
    let tree: Vec<api::Node> = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {} as a discussion tree", file.display()))?;
    let mut store = CommentStore::new();
    store
        .load(tree)
        .with_context(|| format!("loading {}", file.display()))?;
    tracing::debug!(nodes = store.count_all(), "loaded discussion tree");
    Ok(store)
}

fn describe(n: &Node) -> String {
    let mut res = format!("[{}] {}: {}", n.id, n.author_id, n.text.replace('\n', " "));
    if !n.likes.is_empty() {
        res += &format!(" ({} likes)", n.likes.len());
    }
    if n.edited_at.is_some() {
        res += " (edited)";
    }
    res
}

fn show(store: &CommentStore, pages: usize) {
    let mut disclosure = ReplyDisclosure::new();
    for c in store.roots() {
        println!("{}", describe(c));
        if pages > 0 {
            disclosure.reveal(c.id, c.children.len());
            for _ in 1..pages {
                disclosure.show_more(c.id, c.children.len());
            }
        }
        for r in disclosure.visible(c) {
            println!("    {}", describe(r));
            for s in r.children.iter() {
                println!("        {}", describe(s));
            }
        }
        let hidden = c.children.len() - disclosure.revealed(&c.id, c.children.len());
        if hidden > 0 {
            println!("    ... {hidden} more replies");
        }
    }
}

fn count(store: &CommentStore) {
    let comments = store.roots().len();
    let replies = store.roots().iter().map(|c| c.children.len()).sum::<usize>();
    let sub_replies = store
        .roots()
        .iter()
        .flat_map(|c| c.children.iter())
        .map(|r| r.children.len())
        .sum::<usize>();
    println!("comments: {comments}");
    println!("replies: {replies}");
    println!("sub-replies: {sub_replies}");
    println!("total: {}", store.count_all());
}

fn liked(store: &CommentStore, user: UserId) {
    let print = |path: NodePath, n: &Node| {
        if n.likes.contains(&user) {
            println!("{path}: {}", describe(n));
        }
    };
    for c in store.roots() {
        print(NodePath::comment(c.id), c);
        for r in c.children.iter() {
            print(NodePath::reply(c.id, r.id), r);
            for s in r.children.iter() {
                print(NodePath::sub_reply(c.id, r.id, s.id), s);
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();
    let store = load(&opt.file)?;

    match opt.cmd {
        Command::Show { pages } => show(&store, pages),
        Command::Count => count(&store),
        Command::Liked => liked(&store, acting_user()?),
    }

    Ok(())
}
