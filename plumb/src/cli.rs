use clap::{Parser, Subcommand};
use plumb_core::error::BitResult;
use plumb_core::obj::{hash_of, BitId};
use plumb_core::pack::Pack;
use plumb_core::repo::Repo;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, about = "Inspect a content-addressed object store")]
struct Opts {
    #[command(subcommand)]
    subcmd: SubCmd,
    /// Run as if started in <path> instead of the current directory
    #[arg(short = 'C', default_value = ".")]
    root_path: PathBuf,
}

#[derive(Subcommand, Debug)]
enum SubCmd {
    /// Resolve a revision and print its kind, size, and a rendering of its payload
    Show { rev: String },
    /// Print only the raw decompressed payload bytes, for piping
    CatFile { rev: String },
    /// Print a tree's entries, one per line
    LsTree { rev: String },
    /// Verify a single pack's checksums and re-hash every entry in it
    VerifyPack { pack: PathBuf },
}

pub fn run<T: Into<OsString> + Clone>(args: impl IntoIterator<Item = T>) -> BitResult<()> {
    let Opts { subcmd, root_path } = Opts::parse_from(args);

    match subcmd {
        SubCmd::Show { rev } => cmd_show(&root_path, &rev),
        SubCmd::CatFile { rev } => cmd_cat_file(&root_path, &rev),
        SubCmd::LsTree { rev } => cmd_ls_tree(&root_path, &rev),
        SubCmd::VerifyPack { pack } => cmd_verify_pack(&pack),
    }
}

fn resolve(repo: &Repo, rev: &str) -> BitResult<plumb_core::obj::Object> {
    let id: BitId = rev.parse()?;
    repo.object_from_bit_id(id)
}

fn cmd_show(root_path: &Path, rev: &str) -> BitResult<()> {
    let repo = Repo::open(root_path)?;
    let object = resolve(&repo, rev)?;
    println!("{} {}", object.obj_type(), object.size());
    print!("{}", object);
    Ok(())
}

fn cmd_cat_file(root_path: &Path, rev: &str) -> BitResult<()> {
    use plumb_core::serialize::Serialize;
    let repo = Repo::open(root_path)?;
    let object = resolve(&repo, rev)?;
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    object.serialize(&mut lock)
}

fn cmd_ls_tree(root_path: &Path, rev: &str) -> BitResult<()> {
    let repo = Repo::open(root_path)?;
    let tree = resolve(&repo, rev)?.into_tree()?;
    for entry in &tree.entries {
        println!("{}", entry);
    }
    Ok(())
}

fn pack_and_idx_paths(input: &Path) -> (PathBuf, PathBuf) {
    let stem = match input.extension().and_then(|ext| ext.to_str()) {
        Some("pack") | Some("idx") => input.with_extension(""),
        _ => input.to_path_buf(),
    };
    (stem.with_extension("pack"), stem.with_extension("idx"))
}

fn cmd_verify_pack(pack_arg: &Path) -> BitResult<()> {
    let (pack_path, idx_path) = pack_and_idx_paths(pack_arg);
    let mut pack = Pack::new(0, &pack_path, &idx_path)?;

    let mut checked = 0u32;
    for oid in pack.all_oids()? {
        let raw = pack.read_obj_raw(oid)?;
        let actual = hash_of(raw.obj_type, &raw.bytes);
        if actual != oid {
            return Err(plumb_core::error::BitError::corrupt(
                "pack entry",
                format!("`{}` re-hashes to `{}`", oid, actual),
            )
            .into());
        }
        checked += 1;
    }

    println!("{}: ok, {} objects verified", pack_path.display(), checked);
    Ok(())
}
