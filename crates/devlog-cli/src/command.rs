//! Command-line argument parsing.

use std::path::PathBuf;

use anyhow::{bail, Result};

pub const USAGE: &str = "\
Usage: devlog <command> [args]

Session:
  login [email]              Sign in (prompts for password)
  register <name> <email>    Create an account and sign in
  logout                     Sign out and revoke the refresh token
  whoami                     Show the signed-in user

Posts:
  posts [query] [--author <uid>] [--page <n>]
  post <id>
  create-post <file.json>
  update-post <id> <file.json>
  delete-post <id>
  like <id> | unlike <id>

Comments:
  comments <post-id>
  comment <post-id> <text> [--reply-to <comment-id>]
  delete-comment <id>

Tags and projects:
  tags
  projects [--featured] [--page <n>]
  project <slug>
  create-project <file.json>
  update-project <id> <file.json>
  delete-project <id>

Image AI:
  prompt <post-id>           Suggest an image prompt for a post
  image <prompt> <out.png>   Generate an image

Environment:
  DEVLOG_API_URL   backend base URL
  DEVLOG_LOG_DIR   write logs to a daily file in this directory
  RUST_LOG         log filter (default: warn)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Login { email: Option<String> },
    Register { display_name: String, email: String },
    Logout,
    WhoAmI,
    Posts { query: Option<String>, author: Option<String>, page: u32 },
    Post { id: String },
    CreatePost { file: PathBuf },
    UpdatePost { id: String, file: PathBuf },
    DeletePost { id: String },
    Like { id: String },
    Unlike { id: String },
    Comments { post_id: String },
    Comment { post_id: String, body: String, reply_to: Option<String> },
    DeleteComment { id: String },
    Tags,
    Projects { featured: bool, page: u32 },
    Project { slug: String },
    CreateProject { file: PathBuf },
    UpdateProject { id: String, file: PathBuf },
    DeleteProject { id: String },
    Prompt { post_id: String },
    Image { prompt: String, out: PathBuf },
}

impl Command {
    /// Whether the command needs a signed-in session to be useful.
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::Help
                | Command::Login { .. }
                | Command::Register { .. }
                | Command::Logout
                | Command::Posts { .. }
                | Command::Post { .. }
                | Command::Comments { .. }
                | Command::Tags
                | Command::Projects { .. }
                | Command::Project { .. }
        )
    }
}

/// Split flags from positional arguments.
struct Args {
    positional: Vec<String>,
    flags: Vec<(String, Option<String>)>,
}

impl Args {
    fn parse(raw: &[String], valued: &[&str]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut flags = Vec::new();
        let mut iter = raw.iter();
        while let Some(arg) = iter.next() {
            if let Some(name) = arg.strip_prefix("--") {
                if valued.contains(&name) {
                    let Some(value) = iter.next() else {
                        bail!("--{} needs a value", name);
                    };
                    flags.push((name.to_string(), Some(value.clone())));
                } else {
                    flags.push((name.to_string(), None));
                }
            } else {
                positional.push(arg.clone());
            }
        }
        Ok(Self { positional, flags })
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|(n, _)| n == name)
    }

    fn value(&self, name: &str) -> Option<String> {
        self.flags
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.clone())
    }

    fn page(&self) -> Result<u32> {
        match self.value("page") {
            Some(p) => p
                .parse()
                .map_err(|_| anyhow::anyhow!("--page must be a number, got {:?}", p)),
            None => Ok(0),
        }
    }

    fn required(&self, index: usize, what: &str) -> Result<String> {
        match self.positional.get(index) {
            Some(value) => Ok(value.clone()),
            None => bail!("missing <{}>\n\n{}", what, USAGE),
        }
    }

    fn optional(&self, index: usize) -> Option<String> {
        self.positional.get(index).cloned()
    }
}

/// Parse everything after the program name.
pub fn parse(args: &[String]) -> Result<Command> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    let args = Args::parse(rest, &["author", "page", "reply-to"])?;

    let command = match name.as_str() {
        "help" | "-h" | "--help" => Command::Help,
        "login" => Command::Login {
            email: args.optional(0),
        },
        "register" => Command::Register {
            display_name: args.required(0, "name")?,
            email: args.required(1, "email")?,
        },
        "logout" => Command::Logout,
        "whoami" | "me" => Command::WhoAmI,
        "posts" => Command::Posts {
            query: args.optional(0),
            author: args.value("author"),
            page: args.page()?,
        },
        "post" => Command::Post {
            id: args.required(0, "id")?,
        },
        "create-post" => Command::CreatePost {
            file: args.required(0, "file.json")?.into(),
        },
        "update-post" => Command::UpdatePost {
            id: args.required(0, "id")?,
            file: args.required(1, "file.json")?.into(),
        },
        "delete-post" => Command::DeletePost {
            id: args.required(0, "id")?,
        },
        "like" => Command::Like {
            id: args.required(0, "id")?,
        },
        "unlike" => Command::Unlike {
            id: args.required(0, "id")?,
        },
        "comments" => Command::Comments {
            post_id: args.required(0, "post-id")?,
        },
        "comment" => Command::Comment {
            post_id: args.required(0, "post-id")?,
            body: args.positional[1..].join(" "),
            reply_to: args.value("reply-to"),
        },
        "delete-comment" => Command::DeleteComment {
            id: args.required(0, "id")?,
        },
        "tags" => Command::Tags,
        "projects" => Command::Projects {
            featured: args.flag("featured"),
            page: args.page()?,
        },
        "project" => Command::Project {
            slug: args.required(0, "slug")?,
        },
        "create-project" => Command::CreateProject {
            file: args.required(0, "file.json")?.into(),
        },
        "update-project" => Command::UpdateProject {
            id: args.required(0, "id")?,
            file: args.required(1, "file.json")?.into(),
        },
        "delete-project" => Command::DeleteProject {
            id: args.required(0, "id")?,
        },
        "prompt" => Command::Prompt {
            post_id: args.required(0, "post-id")?,
        },
        "image" => Command::Image {
            prompt: args.required(0, "prompt")?,
            out: args.required(1, "out.png")?.into(),
        },
        other => bail!("unknown command {:?}\n\n{}", other, USAGE),
    };

    if let Command::Comment { ref body, .. } = command {
        if body.trim().is_empty() {
            bail!("comment text is empty");
        }
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_no_args_is_help() {
        assert_eq!(parse(&[]).unwrap(), Command::Help);
    }

    #[test]
    fn test_posts_with_filters() {
        assert_eq!(
            parse(&args("posts rust --author u-1 --page 2")).unwrap(),
            Command::Posts {
                query: Some("rust".to_string()),
                author: Some("u-1".to_string()),
                page: 2,
            }
        );
        assert!(parse(&args("posts --page two")).is_err());
        assert!(parse(&args("posts --author")).is_err());
    }

    #[test]
    fn test_comment_joins_words() {
        assert_eq!(
            parse(&args("comment p1 great post --reply-to c9")).unwrap(),
            Command::Comment {
                post_id: "p1".to_string(),
                body: "great post".to_string(),
                reply_to: Some("c9".to_string()),
            }
        );
        assert!(parse(&args("comment p1")).is_err());
    }

    #[test]
    fn test_missing_argument_and_unknown_command() {
        assert!(parse(&args("post")).is_err());
        assert!(parse(&args("frobnicate")).is_err());
    }

    #[test]
    fn test_requires_login() {
        assert!(!parse(&args("tags")).unwrap().requires_login());
        assert!(parse(&args("like p1")).unwrap().requires_login());
        assert_eq!(
            parse(&args("projects --featured")).unwrap(),
            Command::Projects {
                featured: true,
                page: 0
            }
        );
    }
}
