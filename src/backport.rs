//! Git-level backport execution.
//!
//! A backport replays the diff a merge commit introduced onto a release
//! branch:
//!
//! - Bare clone of the remote into a throwaway directory
//! - Fetch of the PR's phantom merge ref and head ref
//! - Three-way merge of (first parent tree, target tip tree, merge tree)
//! - New commit on `backports/<target>/<sha>/pr<n>` and a non-forcing push
//!
//! Using the merge commit's first parent as merge base limits the replay to
//! exactly what the pull request changed, leaving out history that already
//! lives on the target branch.
//!
//! All of this is blocking libgit2 work; callers run it on the blocking pool.
use git2::{
    BranchType, Cred, ErrorClass, ErrorCode, FetchOptions, PushOptions,
    Reference, RemoteCallbacks, Repository, Signature,
};
use log::*;
use secrecy::ExposeSecret;
use std::path::Path;

#[cfg(test)]
use mockall::automock;

use crate::{
    PatchbackError, Result,
    config::{CommitterConfig, ConflictPolicy},
    forge::{config::TOKEN_USERNAME, token::InstallationToken},
    outcome::{BackportFailure, Outcome},
    request::{BackportBranchName, BackportRequest},
};

pub mod conflicts;

/// Name of the remote created by the clone.
const REMOTE: &str = "origin";

/// Performs the clone/cherry-pick/push sequence for one request.
#[cfg_attr(test, automock)]
pub trait Backporter: Send + Sync {
    /// Push a backport branch for `req`, or report why it could not be
    /// done. Unexpected faults come back as the outer error.
    fn backport(
        &self,
        req: &BackportRequest,
        token: &InstallationToken,
    ) -> Result<Outcome<BackportBranchName>>;
}

/// [`Backporter`] built on libgit2.
#[derive(Debug, Clone)]
pub struct GitBackporter {
    committer: CommitterConfig,
    conflict_policy: ConflictPolicy,
}

/// Create Git authentication callbacks for installation token
/// authentication.
///
/// The token is offered once; a second credential request means the remote
/// rejected it, and failing here keeps libgit2 from retrying forever.
fn get_auth_callbacks<'r>(token: &InstallationToken) -> RemoteCallbacks<'r> {
    let secret = token.secret().expose_secret().to_string();
    let mut attempted = false;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| {
        if attempted {
            return Err(git2::Error::from_str(
                "installation token was rejected by the remote",
            ));
        }
        attempted = true;
        Cred::userpass_plaintext(TOKEN_USERNAME, &secret)
    });
    callbacks
}

/// Whether a push failed because the credential lacks write access.
fn is_push_forbidden(err: &git2::Error) -> bool {
    err.class() == ErrorClass::Http && err.message().contains("403")
}

impl GitBackporter {
    pub fn new(committer: CommitterConfig, conflict_policy: ConflictPolicy) -> Self {
        Self {
            committer,
            conflict_policy,
        }
    }

    fn backport_in(
        &self,
        local_path: &Path,
        req: &BackportRequest,
        token: &InstallationToken,
    ) -> Result<Outcome<BackportBranchName>> {
        let branch = req.branch_name();

        // a label can name something no git branch could ever be called
        if !Reference::is_valid_name(&format!("refs/heads/{}", req.target_branch)) {
            info!("{:?} is not a valid branch name", req.target_branch);
            return Ok(Err(BackportFailure::TargetBranchMissing {
                branch: req.target_branch.clone(),
            }));
        }

        let repo = clone_bare(local_path, req, token)?;
        info!("cloned {} into {}", req.clone_url, local_path.display());

        fetch_pull_refs(&repo, req.pr_number, token)?;
        info!("fetched read-only PR refs");

        let tip = match repo.find_branch(
            &format!("{REMOTE}/{}", req.target_branch),
            BranchType::Remote,
        ) {
            Ok(target) => target.get().peel_to_commit()?,
            Err(err)
                if matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) =>
            {
                info!("target branch {} does not exist", req.target_branch);
                return Ok(Err(BackportFailure::TargetBranchMissing {
                    branch: req.target_branch.clone(),
                }));
            }
            Err(err) => return Err(err.into()),
        };

        if repo
            .find_branch(&format!("{REMOTE}/{branch}"), BranchType::Remote)
            .is_ok()
        {
            warn!("backport branch {branch} already exists on the remote");
            return Ok(Err(BackportFailure::BackportBranchExists {
                branch: branch.to_string(),
            }));
        }

        info!("cherry-picking {} into {branch}", req.merge_commit_sha);

        let cherry = repo
            .revparse_single(&req.merge_commit_sha)?
            .peel_to_commit()?;

        repo.branch(branch.as_str(), &tip, false)?;

        match repo.merge_base(cherry.id(), tip.id()) {
            Ok(base) => debug!("merge base of {} and {}: {base}", cherry.id(), tip.id()),
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!("{} shares no history with {}", cherry.id(), tip.id())
            }
            Err(err) => return Err(err.into()),
        }

        let base_tree = cherry.parent(0)?.tree()?;
        let mut index =
            repo.merge_trees(&base_tree, &tip.tree()?, &cherry.tree()?, None)?;

        if index.has_conflicts() {
            let paths = conflicts::conflicted_paths(&index)?;
            match self.conflict_policy {
                ConflictPolicy::Abort => {
                    info!("cherry-pick conflicts in {}: aborting", paths.join(", "));
                    return Ok(Err(BackportFailure::MergeConflict { paths }));
                }
                ConflictPolicy::CommitMarkers => {
                    warn!(
                        "cherry-pick conflicts in {}: committing conflict markers",
                        paths.join(", ")
                    );
                    conflicts::resolve_with_markers(&repo, &mut index)?;
                }
            }
        }

        let tree_id = index.write_tree_to(&repo)?;
        let tree = repo.find_tree(tree_id)?;

        let committer =
            Signature::now(&self.committer.name, &self.committer.email)?;
        let message = String::from_utf8_lossy(cherry.message_bytes());

        let commit_id = repo.commit(
            Some(&format!("refs/heads/{branch}")),
            &cherry.author(),
            &committer,
            &message,
            &tree,
            &[&tip],
        )?;
        info!("backported the commit into {branch} as {commit_id}");

        repo.remote_add_push(
            REMOTE,
            &format!("refs/heads/{branch}:refs/heads/{branch}"),
        )?;

        info!("pushing {branch} back to {}", req.clone_url);
        if let Err(failure) = push(&repo, req, token)? {
            return Ok(Err(failure));
        }
        info!("push of {branch} succeeded");

        Ok(Ok(branch))
    }
}

impl Backporter for GitBackporter {
    fn backport(
        &self,
        req: &BackportRequest,
        token: &InstallationToken,
    ) -> Result<Outcome<BackportBranchName>> {
        let dir = tempfile::Builder::new()
            .prefix(&req.clone_dir_prefix())
            .suffix(&req.clone_dir_suffix())
            .tempdir()?;
        info!("created a temporary dir: {}", dir.path().display());

        let result = self.backport_in(dir.path(), req, token);

        let dir_path = dir.path().to_path_buf();
        if let Err(err) = dir.close() {
            warn!(
                "failed to remove temporary dir {}: {err}",
                dir_path.display()
            );
        }

        result
    }
}

fn clone_bare(
    local_path: &Path,
    req: &BackportRequest,
    token: &InstallationToken,
) -> Result<Repository> {
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(get_auth_callbacks(token));

    let repo = git2::build::RepoBuilder::new()
        .bare(true)
        .fetch_options(fetch_options)
        .clone(&req.clone_url, local_path)?;

    Ok(repo)
}

/// Map the phantom merge ref and the PR head ref into namespaces that
/// cannot collide with branches, then fetch them.
fn fetch_pull_refs(
    repo: &Repository,
    pr_number: u64,
    token: &InstallationToken,
) -> Result<()> {
    repo.remote_add_fetch(
        REMOTE,
        &format!("+refs/pull/{pr_number}/merge:refs/merge/{REMOTE}/{pr_number}"),
    )?;
    repo.remote_add_fetch(
        REMOTE,
        &format!("+refs/pull/{pr_number}/head:refs/pull/{REMOTE}/{pr_number}"),
    )?;

    // refspec changes only apply to freshly loaded remotes
    let mut remote = repo.find_remote(REMOTE)?;
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(get_auth_callbacks(token));
    remote.fetch(&[] as &[&str], Some(&mut fetch_options), None)?;

    Ok(())
}

/// Push using the configured push mapping. Never forces: an existing
/// remote branch makes the remote reject the update.
fn push(
    repo: &Repository,
    req: &BackportRequest,
    token: &InstallationToken,
) -> Result<Outcome<()>> {
    let mut rejections: Vec<String> = vec![];

    let pushed = {
        let mut callbacks = get_auth_callbacks(token);
        callbacks.push_update_reference(|refname, status| {
            if let Some(status) = status {
                rejections.push(format!("{refname}: {status}"));
            }
            Ok(())
        });

        let mut push_opts = PushOptions::new();
        push_opts.remote_callbacks(callbacks);

        let mut remote = repo.find_remote(REMOTE)?;
        remote.push(&[] as &[&str], Some(&mut push_opts))
    };

    match pushed {
        Err(err) if is_push_forbidden(&err) => {
            info!("push to {} was forbidden: {err}", req.clone_url);
            return Ok(Err(BackportFailure::PushPermissionDenied {
                remote: req.clone_url.clone(),
            }));
        }
        Err(err) => return Err(err.into()),
        Ok(()) => {}
    }

    if !rejections.is_empty() {
        return Err(PatchbackError::PushRejected(rejections.join("; ")));
    }

    Ok(Ok(()))
}
