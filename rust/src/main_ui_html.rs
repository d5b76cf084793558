pub fn build_main_ui_html() -> String {
    MAIN_UI_HTML.to_string()
}

const MAIN_UI_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>PromptForge</title>
  <style>
    :root {
      --bg: #1f2024;
      --panel: #1b1c20;
      --line: #3f4248;
      --input-bg: #272a2f;
      --input-line: #4a4e55;
      --text: #f3f5f7;
      --muted: #9ca2ad;
      --btn-bg: #2a2d33;
      --btn-line: #5b616d;
      --accent: #6f8099;
    }
    * { box-sizing: border-box; }
    body {
      margin: 0;
      color: var(--text);
      background: var(--bg);
      font-family: "Segoe UI", "Helvetica Neue", sans-serif;
      font-size: 14px;
    }
    .wrap {
      display: grid;
      grid-template-columns: minmax(0, 3fr) minmax(0, 2fr);
      gap: 8px;
      height: 100vh;
      padding: 8px;
    }
    .frame {
      border: 1px solid var(--line);
      background: var(--panel);
      padding: 8px;
      display: flex;
      flex-direction: column;
      min-height: 0;
      gap: 6px;
    }
    .field { display: flex; flex-direction: column; gap: 2px; }
    .field label { font-size: 12px; font-weight: 600; }
    select, input, textarea, button { font: inherit; }
    select, input, textarea {
      width: 100%;
      border: 1px solid var(--input-line);
      background: var(--input-bg);
      padding: 4px 6px;
      border-radius: 4px;
      color: var(--text);
      outline: none;
      font-size: 13px;
    }
    textarea { min-height: 56px; resize: vertical; }
    select:focus, input:focus, textarea:focus { border-color: var(--accent); }
    .crafted {
      flex: 1 1 auto;
      min-height: 120px;
      overflow: auto;
      border: 1px solid #5b5f67;
      background: #1a1b1f;
      padding: 8px 9px;
      white-space: pre-wrap;
      word-break: break-word;
      font-size: 13px;
      line-height: 1.35;
    }
    .actions { display: flex; gap: 6px; flex-wrap: wrap; }
    .btn {
      min-width: 72px;
      height: 28px;
      border: 1px solid var(--btn-line);
      background: var(--btn-bg);
      color: #ffffff;
      border-radius: 5px;
      padding: 0 10px;
      cursor: pointer;
      font-size: 12px;
    }
    .btn:hover { background: #343842; }
    .btn:disabled { opacity: 0.4; cursor: default; }
    #history {
      list-style: none;
      margin: 0;
      padding: 0;
      overflow: auto;
      flex: 1 1 auto;
      border: 1px solid #2f3137;
    }
    .history-row {
      display: flex;
      gap: 6px;
      align-items: center;
      padding: 4px 6px;
      border-bottom: 1px solid #2f3137;
      cursor: pointer;
      font-size: 12px;
    }
    .history-row:hover { background: #262930; }
    .select-only { display: none; }
    #history-section.select-mode-active .select-only { display: inline-flex; }
    #history-section.select-mode-active .normal-only { display: none; }
    .history-title { align-self: center; font-size: 12px; font-weight: 600; margin-right: auto; }
    .status { min-height: 16px; color: var(--muted); font-size: 11px; }
  </style>
</head>
<body>
  <main class="wrap">
    <section class="frame">
      <div id="fields"></div>
      <div class="actions">
        <button id="generate" class="btn" disabled>Generate</button>
        <button id="save" class="btn" disabled>Save</button>
        <button id="clear" class="btn">Clear</button>
      </div>
      <div id="crafted" class="crafted"></div>
      <div class="actions">
        <button id="copy" class="btn" disabled>Copy</button>
        <button id="export" class="btn" disabled>Export</button>
        <button id="clear-crafted" class="btn">Clear result</button>
      </div>
      <div id="status" class="status"></div>
    </section>
    <section id="history-section" class="frame">
      <div class="actions">
        <span class="history-title">History (<span id="history-count">0</span>)</span>
        <button id="select-history" class="btn normal-only">Select</button>
        <label class="select-only"><input id="select-all-history" type="checkbox" /> All</label>
        <button id="delete-history" class="btn select-only" disabled>Delete</button>
        <button id="cancel-select-history" class="btn select-only">Cancel</button>
      </div>
      <ul id="history"></ul>
    </section>
  </main>

  <script>
    const REVISION_POLL_MS = 200;
    let revision = null;
    let refreshing = false;
    let inputSeq = 0;
    const inflightInputs = new Set();

    // Increases across page reloads so the server can order field edits.
    function nextInputSeq() {
      inputSeq = Math.max(inputSeq + 1, Date.now());
      return inputSeq;
    }

    async function settleInputs() {
      await Promise.allSettled([...inflightInputs]);
    }

    function $(id) {
      return document.getElementById(id);
    }

    function setStatus(message) {
      $("status").textContent = message || "";
    }

    async function apiGet(path) {
      const res = await fetch(path, { method: "GET", cache: "no-store" });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    async function apiPost(path, body) {
      const res = await fetch(path, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body || {}),
      });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    function buildFields(fields) {
      const root = $("fields");
      root.innerHTML = "";
      for (const field of fields) {
        const wrapper = document.createElement("div");
        wrapper.className = "field";

        const label = document.createElement("label");
        label.htmlFor = field.key;
        label.textContent = field.label;

        let control;
        if (Array.isArray(field.choices)) {
          control = document.createElement("select");
          const blank = document.createElement("option");
          blank.value = "";
          blank.textContent = "";
          control.appendChild(blank);
          for (const choice of field.choices) {
            const option = document.createElement("option");
            option.value = choice;
            option.textContent = choice;
            control.appendChild(option);
          }
        } else if (field.key === "context" || field.key === "additional_info") {
          control = document.createElement("textarea");
        } else {
          control = document.createElement("input");
          control.type = "text";
        }
        control.id = field.key;
        control.value = field.value || "";

        const send = async () => {
          const request = apiPost("/app/input", {
            field: field.key,
            value: control.value,
            seq: nextInputSeq(),
          });
          inflightInputs.add(request);
          try {
            await request;
          } catch (err) {
            setStatus(`Input error: ${err.message}`);
          } finally {
            inflightInputs.delete(request);
          }
        };
        control.addEventListener("input", send);
        control.addEventListener("change", send);

        wrapper.appendChild(label);
        wrapper.appendChild(control);
        root.appendChild(wrapper);
      }
    }

    function applySnapshot(payload) {
      if (typeof payload.revision === "number") {
        revision = payload.revision;
      }
      for (const field of payload.fields || []) {
        const el = $(field.key);
        if (el && el.value !== field.value && document.activeElement !== el) {
          el.value = field.value;
        }
      }
      $("crafted").textContent = payload.crafted || "";

      const gates = payload.gates || {};
      $("generate").disabled = !gates.generate;
      $("save").disabled = !gates.save;
      $("copy").disabled = !gates.copy;
      $("export").disabled = !gates.export;
      $("delete-history").disabled = !gates.delete_history;

      $("history-section").classList.toggle("select-mode-active", !!payload.select_mode);
      $("select-all-history").checked = !!payload.select_all;
      $("history-count").textContent = String(payload.history_count || 0);
      $("history").innerHTML = payload.history_html || "";
    }

    async function command(body) {
      await settleInputs();
      try {
        const data = await apiPost("/app/command", body);
        applySnapshot(data);
        setStatus("");
      } catch (err) {
        setStatus(`Error: ${err.message}`);
      }
    }

    async function refreshIfChanged() {
      if (refreshing) {
        return;
      }
      refreshing = true;
      try {
        const data = await apiGet("/app/revision");
        if (data.revision !== revision) {
          applySnapshot(await apiGet("/app/init"));
        }
      } catch (_) {
        // Server gone or restarting; keep the current page state.
      } finally {
        refreshing = false;
      }
    }

    async function init() {
      try {
        const data = await apiGet("/app/init");
        buildFields(data.fields || []);
        applySnapshot(data);
      } catch (err) {
        setStatus(`Startup error: ${err.message}`);
      }
      setInterval(() => {
        void refreshIfChanged();
      }, REVISION_POLL_MS);
    }

    $("generate").addEventListener("click", async () => {
      setStatus("Generating...");
      await settleInputs();
      try {
        const data = await apiPost("/app/generate", {});
        applySnapshot(data);
        setStatus("");
      } catch (err) {
        setStatus(`Generate error: ${err.message}`);
      }
    });

    $("save").addEventListener("click", () => command({ command: "save" }));
    $("clear").addEventListener("click", () => command({ command: "clear" }));
    $("clear-crafted").addEventListener("click", () => command({ command: "clear_crafted" }));
    $("select-history").addEventListener("click", () => command({ command: "toggle_select_mode" }));
    $("cancel-select-history").addEventListener("click", () => command({ command: "toggle_select_mode" }));
    $("delete-history").addEventListener("click", () => command({ command: "delete_selected" }));
    $("select-all-history").addEventListener("change", (event) => {
      command({ command: "select_all", checked: event.target.checked });
    });

    $("history").addEventListener("click", (event) => {
      const row = event.target.closest(".history-row");
      if (!row) {
        return;
      }
      const id = Number(row.dataset.id);
      if (event.target.classList.contains("history-check")) {
        command({ command: "set_row_checked", id, checked: event.target.checked });
      } else {
        command({ command: "click_row", id });
      }
    });

    $("copy").addEventListener("click", async () => {
      try {
        const data = await apiPost("/app/copy", {});
        if (!data.copied) {
          return;
        }
        if (!data.system_clipboard && navigator.clipboard) {
          await navigator.clipboard.writeText(data.text);
        }
        setStatus("Copied.");
      } catch (err) {
        setStatus(`Copy error: ${err.message}`);
      }
    });

    $("export").addEventListener("click", () => {
      const a = document.createElement("a");
      a.href = "/app/export";
      a.download = "";
      document.body.appendChild(a);
      a.click();
      a.remove();
    });

    init();
  </script>
</body>
</html>
"#;
