pub const BASH: &str = r##"# sipag completion for bash
#
# Install:
#   source <(sipag completions bash)
#   # or persist it:
#   sipag completions bash > ~/.bash_completion.d/sipag
#   echo 'source ~/.bash_completion.d/sipag' >> ~/.bashrc

_sipag_workstream_ids() {
    local dir="${SIPAG_DIR:-$HOME/.sipag}"
    sipag state show 2>/dev/null | grep '"id"' | sed -E 's/.*"id": "([^"]*)".*/\1/'
}

_sipag() {
    local cur prev words cword
    cur="${COMP_WORDS[COMP_CWORD]}"
    prev="${COMP_WORDS[COMP_CWORD-1]}"

    local top="workstream proxy pair state completions version help"

    case "$prev" in
        sipag)
            COMPREPLY=( $(compgen -W "$top" -- "$cur") )
            return 0
            ;;
        workstream)
            COMPREPLY=( $(compgen -W "new list rm repair" -- "$cur") )
            return 0
            ;;
        proxy)
            COMPREPLY=( $(compgen -W "serve" -- "$cur") )
            return 0
            ;;
        pair)
            COMPREPLY=( $(compgen -W "enable disable status" -- "$cur") )
            return 0
            ;;
        state)
            COMPREPLY=( $(compgen -W "show flush" -- "$cur") )
            return 0
            ;;
        completions)
            COMPREPLY=( $(compgen -W "bash zsh fish" -- "$cur") )
            return 0
            ;;
        rm)
            COMPREPLY=( $(compgen -W "$(_sipag_workstream_ids)" -- "$cur") )
            return 0
            ;;
        enable)
            COMPREPLY=( $(compgen -W "$(_sipag_workstream_ids)" -- "$cur") )
            return 0
            ;;
        --worktree|--branch|--local-path|--title)
            COMPREPLY=()
            return 0
            ;;
    esac

    COMPREPLY=( $(compgen -W "$top" -- "$cur") )
}

complete -F _sipag sipag
"##;

pub const ZSH: &str = r##"#compdef sipag
# sipag completion for zsh
#
# Install:
#   sipag completions zsh > ~/.zsh/completions/_sipag
#   # Ensure the directory is in fpath (add to ~/.zshrc):
#   #   fpath=(~/.zsh/completions $fpath)
#   #   autoload -Uz compinit && compinit

_sipag() {
    local state line context
    typeset -A opt_args

    _arguments -C \
        '(-h --help)'{-h,--help}'[Show help]' \
        '(-V --version)'{-V,--version}'[Print version]' \
        '1: :->command' \
        '*:: :->args' && return 0

    case $state in
        command)
            local -a commands
            commands=(
                'workstream:Manage workstreams (one per agent container)'
                'proxy:Run a single git-proxy socket server in the foreground'
                'pair:Drive the pairing orchestrator'
                'state:Inspect or force-persist host state'
                'completions:Print shell completion scripts'
                'version:Print version'
                'help:Show help'
            )
            _describe 'command' commands
            ;;
        args)
            case $line[1] in
                workstream)
                    local -a subcmds
                    subcmds=(
                        'new:Derive a branch and register a new workstream'
                        'list:List workstreams'
                        'rm:Remove a workstream'
                        'repair:Run the state repairer'
                    )
                    _describe 'subcommand' subcmds
                    ;;
                proxy)
                    _describe 'subcommand' '(serve:"Start a git-proxy socket for one container")'
                    ;;
                pair)
                    local -a subcmds
                    subcmds=(
                        'enable:Enable pairing for a workstream'
                        'disable:Disable pairing'
                        'status:Print current pairing status'
                    )
                    _describe 'subcommand' subcmds
                    ;;
                state)
                    local -a subcmds
                    subcmds=('show:Print persisted state' 'flush:Force an immediate save')
                    _describe 'subcommand' subcmds
                    ;;
                completions)
                    local -a shells
                    shells=('bash:Bash completion script' 'zsh:Zsh completion script' 'fish:Fish completion script')
                    _describe 'shell' shells
                    ;;
            esac
            ;;
    esac
}

_sipag "$@"
"##;

pub const FISH: &str = r##"# sipag completion for fish shell
#
# Install:
#   sipag completions fish > ~/.config/fish/completions/sipag.fish

complete -c sipag -f

set -l sipag_cmds workstream proxy pair state completions version help

complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a workstream  -d 'Manage workstreams'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a proxy       -d 'Run a git-proxy socket server'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a pair        -d 'Drive the pairing orchestrator'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a state       -d 'Inspect or force-persist host state'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a completions -d 'Print shell completion scripts'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a version     -d 'Print version'
complete -c sipag -n "not __fish_seen_subcommand_from $sipag_cmds" -a help        -d 'Show help'

complete -c sipag -n '__fish_seen_subcommand_from workstream' -a 'new'    -d 'Derive a branch and register a new workstream'
complete -c sipag -n '__fish_seen_subcommand_from workstream' -a 'list'   -d 'List workstreams'
complete -c sipag -n '__fish_seen_subcommand_from workstream' -a 'rm'     -d 'Remove a workstream'
complete -c sipag -n '__fish_seen_subcommand_from workstream' -a 'repair' -d 'Run the state repairer'

complete -c sipag -n '__fish_seen_subcommand_from proxy' -a 'serve' -d 'Start a git-proxy socket for one container'

complete -c sipag -n '__fish_seen_subcommand_from pair' -a 'enable'  -d 'Enable pairing for a workstream'
complete -c sipag -n '__fish_seen_subcommand_from pair' -a 'disable' -d 'Disable pairing'
complete -c sipag -n '__fish_seen_subcommand_from pair' -a 'status'  -d 'Print current pairing status'

complete -c sipag -n '__fish_seen_subcommand_from state' -a 'show'  -d 'Print persisted state'
complete -c sipag -n '__fish_seen_subcommand_from state' -a 'flush' -d 'Force an immediate save'

complete -c sipag -n '__fish_seen_subcommand_from completions' -a 'bash' -d 'Bash completion script'
complete -c sipag -n '__fish_seen_subcommand_from completions' -a 'zsh'  -d 'Zsh completion script'
complete -c sipag -n '__fish_seen_subcommand_from completions' -a 'fish' -d 'Fish completion script'

complete -c sipag -n '__fish_seen_subcommand_from new' -l title -d 'Display title'
complete -c sipag -n '__fish_seen_subcommand_from list' -l active -d 'Only active workstreams'
complete -c sipag -n '__fish_seen_subcommand_from serve' -l worktree -d 'Worktree path'
complete -c sipag -n '__fish_seen_subcommand_from serve' -l branch -d 'Branch name'
complete -c sipag -n '__fish_seen_subcommand_from enable' -l local-path -d 'Local worktree path to sync'
"##;
