use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::events::CalendarLabels;
use crate::grid::{
  CalendarSettings,
  LabelLength,
  StandardEvent
};

const RC_ENV_VAR: &str = "EVENTGRIDRC";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("data.location", "~/.eventgrid"),
      ("default.command", "calendar"),
      ("calendar.week_start", "1"),
      ("calendar.show_days", "1111111"),
      (
        "calendar.standard",
        "today,prev-next,holidays"
      ),
      ("calendar.label_length", "3"),
      ("color", "on")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.to_string(),
      value.to_string()
    );
  }

  /// Week start and visible days,
  /// validated before anything renders.
  #[tracing::instrument(skip(self))]
  pub fn calendar_settings(
    &self
  ) -> anyhow::Result<CalendarSettings> {
    let week_start = match self
      .get("calendar.week_start")
    {
      | Some(raw) => {
        raw.trim().parse::<u32>().map_err(
          |_| {
            anyhow!(
              "invalid \
               calendar.week_start: \
               {raw}"
            )
          }
        )?
      }
      | None => 1
    };

    let show_days = match self
      .get("calendar.show_days")
    {
      | Some(raw) => {
        parse_show_days(&raw)?
      }
      | None => vec![true; 7]
    };

    let settings = CalendarSettings::new(
      week_start, &show_days
    )
    .context(
      "invalid calendar settings"
    )?;
    debug!(?settings, "resolved calendar settings");
    Ok(settings)
  }

  /// Standard predicates to attach,
  /// in configured order.
  pub fn standard_events(
    &self
  ) -> anyhow::Result<Vec<StandardEvent>>
  {
    let Some(raw) =
      self.get("calendar.standard")
    else {
      return Ok(vec![]);
    };
    raw
      .split(',')
      .map(str::trim)
      .filter(|s| {
        !s.is_empty()
          && *s != "none"
      })
      .map(|s| s.parse())
      .collect()
  }

  pub fn label_length(
    &self
  ) -> anyhow::Result<LabelLength> {
    match self
      .get("calendar.label_length")
    {
      | Some(raw) => raw.parse(),
      | None => {
        Ok(LabelLength::Chars(3))
      }
    }
  }

  /// English names with any
  /// `calendar.weekday.N` /
  /// `calendar.month.N` overrides.
  pub fn calendar_labels(
    &self
  ) -> anyhow::Result<CalendarLabels> {
    let mut labels =
      CalendarLabels::default();
    labels.length = self.label_length()?;
    for (idx, slot) in labels
      .weekdays
      .iter_mut()
      .enumerate()
    {
      if let Some(name) = self.get(
        &format!(
          "calendar.weekday.{idx}"
        )
      ) {
        *slot = name;
      }
    }
    for (idx, slot) in labels
      .months
      .iter_mut()
      .enumerate()
    {
      if let Some(name) = self.get(
        &format!(
          "calendar.month.{}",
          idx + 1
        )
      ) {
        *slot = name;
      }
    }
    Ok(labels)
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".eventgridrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".eventgrid"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

/// `1111100` or `1,1,1,1,1,0,0`,
/// indexed by weekday number with
/// Sunday first.
fn parse_show_days(
  raw: &str
) -> anyhow::Result<Vec<bool>> {
  let trimmed = raw.trim();
  let tokens: Vec<&str> =
    if trimmed.contains(',') {
      trimmed
        .split(',')
        .map(str::trim)
        .collect()
    } else {
      trimmed
        .char_indices()
        .map(|(i, c)| {
          &trimmed[i..i + c.len_utf8()]
        })
        .collect()
    };

  tokens
    .into_iter()
    .map(|token| {
      match token {
        | "1" => Ok(true),
        | "0" => Ok(false),
        | other => {
          Err(anyhow!(
            "invalid \
             calendar.show_days \
             entry: {other:?}"
          ))
        }
      }
    })
    .collect()
}
