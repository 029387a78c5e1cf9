use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use license_manager::config::{Command, Config, DbCommand, IssueArgs, KeyCommand, LicenseCommand};
use license_manager::context::AppContext;
use license_manager::license::license_claims::parse_date;
use license_manager::{license_file, Error, LicenseDraft, LicenseRecord, LicenseStore, SigningAuthority};

fn main() -> anyhow::Result<ExitCode> {
  let cfg = Config::parse();
  license_manager::init_logging(cfg.verbose);

  let dir = match cfg.config_dir.clone() {
    Some(dir) => dir,
    None => AppContext::default_dir().ok_or_else(|| anyhow::anyhow!("cannot determine config dir"))?,
  };
  let mut ctx = AppContext::load(dir)?;

  match cfg.command.clone() {
    Command::Key(cmd) => key_command(&cfg, &mut ctx, cmd),
    Command::License(cmd) => license_command(&cfg, &ctx, cmd),
    Command::Db(cmd) => db_command(&cfg, &mut ctx, cmd),
  }
}

fn key_command(cfg: &Config, ctx: &mut AppContext, cmd: KeyCommand) -> anyhow::Result<ExitCode> {
  match cmd {
    KeyCommand::Generate { out } => {
      let mut authority = SigningAuthority::new();
      authority.generate();
      authority.save_to_file(&out)?;
      ctx.set_last_key(absolute(&out))?;
      println!("{}", authority.export_verification_key()?);
    }

    KeyCommand::Load { path } => {
      let mut authority = SigningAuthority::new();
      authority
        .load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("cannot load key {}: {e}", path.display()))?;
      ctx.set_last_key(absolute(&path))?;
      println!("{}", authority.export_verification_key()?);
    }

    KeyCommand::Show { signing } => {
      let authority = load_authority(cfg, ctx)?;
      if !authority.has_key() {
        return Ok(no_signing_key());
      }
      if signing {
        println!("signing:      {}", authority.export_signing_key()?);
      }
      println!("verification: {}", authority.export_verification_key()?);
    }
  }

  Ok(ExitCode::SUCCESS)
}

fn license_command(cfg: &Config, ctx: &AppContext, cmd: LicenseCommand) -> anyhow::Result<ExitCode> {
  let db_path = cfg.db.clone().unwrap_or_else(|| ctx.license_db_or_default());
  let store = LicenseStore::open(&db_path)?;

  match cmd {
    LicenseCommand::Issue(args) => {
      let authority = load_authority(cfg, ctx)?;
      let draft = draft_from_args(args)?;
      let signed = match authority.issue_today(draft) {
        Ok(signed) => signed,
        Err(Error::NoActiveKey) => return Ok(no_signing_key()),
        Err(e) => return Err(e.into()),
      };
      let id = store.add(&signed)?;
      println!("Issued license {id}");
      println!("{}", signed.signature);
    }

    LicenseCommand::List => print_records(&store.list()?),

    LicenseCommand::Search { query } => print_records(&store.search(&query)?),

    LicenseCommand::Show { id } => {
      let Some(record) = store.get(id)? else {
        return Ok(no_such_license(id));
      };
      println!("id: {}", record.id);
      println!("{}", license_file::to_license_json(&record.license));
    }

    LicenseCommand::Delete { id } => {
      if !store.delete(id)? {
        return Ok(no_such_license(id));
      }
      println!("Deleted license {id}");
    }

    LicenseCommand::Export { id, out } => {
      let Some(record) = store.get(id)? else {
        return Ok(no_such_license(id));
      };
      let out = out.unwrap_or_else(|| db_folder(&db_path).join(license_file::default_file_name(&record.license)));
      license_file::export(&record.license, &out)?;
      println!("License saved to {}", out.display());
    }

    LicenseCommand::Import { path } => {
      let license = license_file::import(&path)?;
      let id = store.add(&license)?;
      println!("Imported license {id} from {}", path.display());
    }
  }

  Ok(ExitCode::SUCCESS)
}

fn db_command(cfg: &Config, ctx: &mut AppContext, cmd: DbCommand) -> anyhow::Result<ExitCode> {
  let current = cfg.db.clone().unwrap_or_else(|| ctx.license_db_or_default());

  match cmd {
    DbCommand::Switch { path } => {
      let store = if current.exists() {
        LicenseStore::open(&current).unwrap_or_else(|e| {
          tracing::warn!(path = %current.display(), error = %e, "Current license database unavailable");
          LicenseStore::disconnected()
        })
      } else {
        LicenseStore::disconnected()
      };
      store.switch(&path)?;
      ctx.set_license_db(absolute(&path))?;
      println!("Using license database {} ({} licenses)", path.display(), store.list()?.len());
    }

    DbCommand::Show => println!("{}", current.display()),
  }

  Ok(ExitCode::SUCCESS)
}

fn load_authority(cfg: &Config, ctx: &AppContext) -> anyhow::Result<SigningAuthority> {
  let mut authority = SigningAuthority::new();
  if let Some(path) = cfg.key.as_deref().or(ctx.last_key()) {
    authority
      .load_from_file(path)
      .map_err(|e| anyhow::anyhow!("cannot load key {}: {e}", path.display()))?;
  }
  Ok(authority)
}

fn draft_from_args(args: IssueArgs) -> anyhow::Result<LicenseDraft> {
  let expires_at = match args.expires.as_deref().map(str::trim) {
    None | Some("") => None,
    Some(s) => Some(parse_date(s)?),
  };
  Ok(LicenseDraft {
    customer: args.customer,
    product: args.product,
    expires_at,
    features: args.features,
    hwid: args.hwid,
  })
}

fn print_records(records: &[LicenseRecord]) {
  println!("{}", LicenseRecord::COLUMNS.join("\t"));
  for record in records {
    println!("{}", record.display_fields().join("\t"));
  }
}

fn no_signing_key() -> ExitCode {
  tracing::warn!("No signing authority available");
  eprintln!("No signing key loaded: run `key generate --out FILE` or `key load FILE` first");
  ExitCode::from(2)
}

fn no_such_license(id: i64) -> ExitCode {
  eprintln!("No license with id {id}");
  ExitCode::FAILURE
}

fn absolute(path: &Path) -> PathBuf {
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn db_folder(db_path: &Path) -> PathBuf {
  absolute(db_path)
    .parent()
    .map(Path::to_path_buf)
    .unwrap_or_else(|| PathBuf::from("."))
}
